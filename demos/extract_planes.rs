use std::ops::ControlFlow;

use lidar_planes::{ExtractionConfig, ExtractionSession, PointCloud, SessionState};

fn main() {
    env_logger::init();

    // Synthetic scene: ground at z=0, a flat roof at z=6, a tilted roof face
    // and some scattered clutter
    let mut pts = Vec::new();
    for i in 0..60 {
        for j in 0..60 {
            pts.push([i as f32 * 0.5, j as f32 * 0.5, ((i * 7 + j * 3) % 11) as f32 * 0.01]);
        }
    }
    for i in 0..20 {
        for j in 0..20 {
            pts.push([5.0 + i as f32 * 0.4, 5.0 + j as f32 * 0.4, 6.0]);
        }
    }
    for i in 0..15 {
        for j in 0..15 {
            let x = 18.0 + i as f32 * 0.4;
            pts.push([x, 18.0 + j as f32 * 0.4, 4.0 + (x - 18.0) * 0.5]);
        }
    }
    for k in 0..200 {
        let t = k as f32;
        pts.push([(t * 0.731) % 30.0, (t * 0.419) % 30.0, 1.0 + (t * 0.257) % 9.0]);
    }
    let cloud = PointCloud::from_points(&pts);
    println!("Loaded cloud: {} points", cloud.len());

    let mut session = match ExtractionSession::new(cloud, ExtractionConfig::seeded(7)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to start session: {e}");
            return;
        }
    };

    // Threshold and iteration count are chosen per round
    let rounds = [(0.15, 500), (0.05, 500), (0.05, 1000)];
    for (epsilon, iterations) in rounds {
        if session.state() == SessionState::Exhausted {
            break;
        }
        let result = session.run_round_with(epsilon, iterations, |step, best| {
            if step.improved {
                println!("  iteration {:4}: best score {}", step.iteration, best.score());
            }
            ControlFlow::Continue(())
        });
        match result {
            Ok(r) => {
                println!(
                    "Round {}: {} inliers, {} remaining, boundary {:?}",
                    r.round,
                    r.inliers.len(),
                    r.outliers.len(),
                    r.boundary.vertices
                );
                if let Some(model) = r.plane.model {
                    println!("  plane normal={:?} d={}", model.normal, model.d);
                }
            }
            Err(e) => {
                eprintln!("round failed: {e}");
                break;
            }
        }
    }

    println!(
        "Processed {} points, {} left",
        session.processed_points().len() + session.previous_inliers().len(),
        session.remaining_cloud().len()
    );
}
