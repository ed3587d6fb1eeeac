use std::rc::Rc;
use std::time::Duration;
use trackdeck::audio::NullAudioResource;
use trackdeck::catalog::Catalog;
use trackdeck::model::Track;
use trackdeck::player::PlayerController;

fn catalog(names: &[&str]) -> Rc<Catalog> {
    let tracks = names
        .iter()
        .map(|name| Track {
            name: name.to_string(),
            artist: String::from("someone"),
            audio_url: format!("https://example.com/{name}.mp3"),
        })
        .collect();
    Rc::new(Catalog::new(tracks).expect("catalog"))
}

fn loaded_controller(names: &[&str], secs: u64) -> PlayerController {
    let audio = NullAudioResource::with_fixed_duration(Duration::from_secs(secs));
    let mut controller = PlayerController::new(catalog(names), Box::new(audio));
    controller.tick();
    assert_eq!(controller.state().duration, Some(Duration::from_secs(secs)));
    controller
}

#[test]
fn next_cycles_through_catalog() {
    let mut controller = loaded_controller(&["a", "b", "c"], 200);
    let visited: Vec<usize> = (0..3)
        .map(|_| {
            controller.next_song();
            controller.state().current_index
        })
        .collect();
    assert_eq!(visited, vec![1, 2, 0]);
}

#[test]
fn seek_half_lands_mid_track() {
    let mut controller = loaded_controller(&["a"], 200);
    controller.seek(0.5);
    assert_eq!(controller.state().position, Duration::from_secs(100));
}

#[test]
fn track_end_advances_and_keeps_playing() {
    let mut controller = loaded_controller(&["a", "b"], 200);
    controller.toggle_play_pause();
    controller.seek(1.0);

    controller.tick();

    let state = controller.state();
    assert_eq!(state.current_index, 1);
    assert!(state.is_playing);
    assert_eq!(state.position, Duration::ZERO);
    assert_eq!(state.duration, None);

    controller.tick();
    assert_eq!(controller.state().duration, Some(Duration::from_secs(200)));
}

#[test]
fn track_end_with_loop_restarts_same_track() {
    let mut controller = loaded_controller(&["a", "b"], 200);
    controller.toggle_play_pause();
    controller.toggle_loop();
    controller.seek(1.0);

    controller.tick();

    let state = controller.state();
    assert_eq!(state.current_index, 0);
    assert!(state.is_playing);
    assert!(state.position < Duration::from_secs(1));
}

#[test]
fn leaving_the_player_pauses_the_resource() {
    let mut controller = loaded_controller(&["a"], 200);
    controller.toggle_play_pause();

    let audio = controller.into_resource();

    assert!(audio.is_paused());
}
