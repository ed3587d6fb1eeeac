#![no_main]

use libfuzzer_sys::fuzz_target;
use std::rc::Rc;
use std::time::Duration;
use trackdeck::audio::NullAudioResource;
use trackdeck::catalog::Catalog;
use trackdeck::model::Track;
use trackdeck::player::PlayerController;

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 16).max(1);
    let tracks = (0..len)
        .map(|idx| Track {
            name: format!("track {idx}"),
            artist: String::from("fuzz"),
            audio_url: format!("track_{idx}.mp3"),
        })
        .collect();
    let Ok(catalog) = Catalog::new(tracks) else {
        return;
    };
    let audio = NullAudioResource::with_fixed_duration(Duration::from_secs(90));
    let mut controller = PlayerController::new(Rc::new(catalog), Box::new(audio));

    for byte in data {
        let value = f64::from(*byte) / 200.0;
        match byte % 9 {
            0 => controller.next_song(),
            1 => controller.prev_song(),
            2 => controller.toggle_play_pause(),
            3 => controller.toggle_loop(),
            4 => controller.seek(value),
            5 => controller.scrub(value * 60.0 - 30.0),
            6 => controller.set_volume(value as f32),
            7 => controller.select_track(usize::from(*byte)),
            _ => controller.tick(),
        }

        let state = controller.state();
        assert!(state.current_index < len);
        assert!((0.0..=1.0).contains(&state.volume));
        if let Some(duration) = state.duration {
            assert!(state.position <= duration);
        }
    }
});
