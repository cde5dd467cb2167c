use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use burn::backend::{Autodiff, NdArray};
use rps_vision::camera::SyntheticCamera;
use rps_vision::{Gesture, GameError, RandomMoves, Session, SessionConfig, SessionEvent};

type Backend = Autodiff<NdArray>;
type Game = Session<Backend, SyntheticCamera, RandomMoves>;

const HELP: &str = "commands: pose <rock|paper|scissors|none>, add <gesture>, capture <gesture>, \
train, start, stop, reset-score, reset, show, quit";

/// Run one typed command. `Ok(false)` ends the game.
fn handle(game: &mut Game, line: &str) -> Result<bool, GameError> {
    let mut words = line.split_whitespace();
    let now = Instant::now();
    match (words.next(), words.next()) {
        (Some("pose"), Some("none")) => game.camera_mut().set_pose(None),
        (Some("pose"), Some(g)) => game.camera_mut().set_pose(Some(g.parse()?)),
        (Some("add"), Some(g)) => {
            let gesture: Gesture = g.parse()?;
            let count = game.collect_sample(gesture)?;
            println!("{} samples:{}", gesture.as_str(), count);
        }
        (Some("capture"), Some(g)) => {
            let gesture: Gesture = g.parse()?;
            game.camera_mut().set_pose(Some(gesture));
            game.begin_capture(gesture, now)?;
        }
        (Some("train"), _) => {
            game.train(|p| log::debug!("epoch {} batch {}: loss {:.5} accuracy {}", p.epoch, p.batch, p.loss, p.accuracy))?;
            println!("Training Completed");
        }
        (Some("start"), _) => game.start_predicting(now)?,
        (Some("stop"), _) => game.stop_predicting()?,
        (Some("reset-score"), _) => game.reset_score()?,
        (Some("reset"), _) => game.reset_all()?,
        (Some("show"), _) => print!("{}", game.view()),
        (Some("quit"), _) | (Some("exit"), _) => return Ok(false),
        (None, _) => {}
        _ => println!("{}", HELP),
    }
    Ok(true)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SessionConfig::default();
    let camera = SyntheticCamera::new(config.extractor.image_size, 42).with_noise(0.05);
    let mut game: Game = match Session::start(config, camera, RandomMoves::new(), Default::default()) {
        Ok(game) => game,
        Err(err) => {
            // nothing works without the extractor
            log::error!("{}", err);
            std::process::exit(1);
        }
    };
    println!("{}", HELP);

    // stdin blocks, so lines arrive from a reader thread while this one keeps the timers ticking
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() { break; }
        }
    });

    let poll_every = Duration::from_millis(20);
    loop {
        match rx.recv_timeout(poll_every) {
            Ok(line) => match handle(&mut game, &line) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) if err.is_user_facing() => println!("notice: {}", err),
                Err(err) => println!("error: {}", err),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        match game.poll(Instant::now()) {
            Ok(events) => {
                for event in events {
                    match event {
                        SessionEvent::SampleCaptured { .. } | SessionEvent::TickSkipped(_) => {}
                        SessionEvent::CaptureFinished(g) => println!("{} capture finished", g.as_str()),
                        SessionEvent::Round(_) => print!("{}", game.view()),
                    }
                }
            }
            Err(err) => {
                log::error!("{}", err);
                break;
            }
        }
    }
}
