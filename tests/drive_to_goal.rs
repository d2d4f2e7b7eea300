//! Scripted end-to-end run: on a straight road, driving forward reaches
//! the goal.

use nalgebra as na;

use trackdrive::{Action, DrawMode, Mlp, Point, Session, SimConfig, TrackKind};

fn straight_road() -> Session<Mlp> {
    let mut session = Session::new(TrackKind::Boundary, SimConfig::default(), 17);
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
    session
}

#[test]
fn driving_forward_closes_on_the_goal_and_succeeds() {
    let goal = Point::new(750.0, 300.0);
    let mut session = straight_road();
    session.start().unwrap();

    let mut last_distance = na::distance(&session.car().unwrap().position(), &goal);
    for frame in 0..400 {
        let outcome = session
            .step_with(Action::Forward)
            .expect("learning session should keep stepping");

        if outcome.done {
            assert_eq!(outcome.reward, 1000.0, "expected a goal, not a crash");
            assert_eq!(session.status().episode, 1);
            assert!(session.status().fitness > 0.0);
            // The car respawns on the start point for the next episode.
            assert_eq!(
                session.car().unwrap().position(),
                Point::new(50.0, 300.0)
            );
            return;
        }

        let distance = na::distance(&session.car().unwrap().position(), &goal);
        assert!(
            distance < last_distance,
            "distance stalled at frame {}: {} -> {}",
            frame,
            last_distance,
            distance
        );
        assert!(outcome.reward > 0.0);
        last_distance = distance;
    }
    panic!("never reached the goal");
}
