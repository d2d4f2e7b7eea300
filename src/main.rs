use std::path::Path;

use anyhow::Result;

use trackdrive::{DrawMode, Mlp, Point, Session, SimConfig, TrackKind};

/// Save slot for the online network's parameters.
const MODEL_PATH: &str = "ai-car-model.json";

const FRAMES: u32 = 50_000;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut session = Session::new(TrackKind::Boundary, SimConfig::default(), 42);
    draw_corridor(&mut session);
    session.load_model(Path::new(MODEL_PATH));
    session.start()?;

    for _ in 0..FRAMES {
        session.step();
    }

    let status = session.status();
    tracing::info!(
        episodes = status.episode,
        fitness = status.fitness,
        epsilon = status.epsilon,
        "training finished"
    );
    session.save_model(Path::new(MODEL_PATH))?;
    Ok(())
}

/// Draws the same straight road a user would: two boundary strokes, then
/// the start and end points.
fn draw_corridor(session: &mut Session<Mlp>) {
    session.set_mode(DrawMode::Boundary);
    session.begin_stroke(Point::new(0.0, 250.0));
    session.extend_stroke(Point::new(800.0, 250.0));
    session.end_stroke();
    session.begin_stroke(Point::new(0.0, 350.0));
    session.extend_stroke(Point::new(800.0, 350.0));
    session.end_stroke();

    session.set_mode(DrawMode::Start);
    session.begin_stroke(Point::new(50.0, 300.0));
    session.end_stroke();

    session.set_mode(DrawMode::End);
    session.begin_stroke(Point::new(750.0, 300.0));
    session.end_stroke();
}
