//! Scripted end-to-end run: an obstacle across the car's path ends the
//! episode with the crash penalty.

use trackdrive::{Action, DrawMode, Mlp, Point, Session, SimConfig, TrackKind};

fn blocked_field() -> Session<Mlp> {
    let mut session = Session::new(TrackKind::Obstacles, SimConfig::default(), 23);
    session.set_mode(DrawMode::Obstacle);
    session.begin_stroke(Point::new(150.0, 250.0));
    session.extend_stroke(Point::new(150.0, 350.0));
    session.end_stroke();
    session.set_mode(DrawMode::Start);
    session.begin_stroke(Point::new(100.0, 300.0));
    session.end_stroke();
    session.set_mode(DrawMode::End);
    session.begin_stroke(Point::new(700.0, 300.0));
    session.end_stroke();
    session
}

#[test]
fn driving_into_an_obstacle_ends_with_the_crash_penalty() {
    let mut session = blocked_field();
    session.start().unwrap();

    for _ in 0..400 {
        let outcome = session
            .step_with(Action::Forward)
            .expect("learning session should keep stepping");
        if outcome.done {
            assert_eq!(outcome.reward, -100.0);
            assert_eq!(session.status().episode, 1);
            // The car respawns on the start point for the next attempt.
            assert_eq!(
                session.car().unwrap().position(),
                Point::new(100.0, 300.0)
            );
            return;
        }
    }
    panic!("never hit the obstacle");
}

#[test]
fn sensors_see_the_obstacle_ahead() {
    let mut session = blocked_field();
    session.start().unwrap();

    let car = session.car().unwrap();
    let readings = car.sense(session.track());
    // Middle ray points straight at the obstacle 50 units ahead; the
    // collision margin shortens the reading by up to its width.
    assert!((readings[2] - 45.0).abs() <= 1.0, "got {}", readings[2]);
    // Flank rays are clear to their full range.
    assert_eq!(readings[0], 200.0);
    assert_eq!(readings[4], 200.0);
}
