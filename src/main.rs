use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::Point3;
use tracing_subscriber::EnvFilter;

use rs_dh_kinematics::constraints::Position;
use rs_dh_kinematics::kinematic_traits::{IKSolver, StepResult};
use rs_dh_kinematics::kinematic_tree::{JointId, KinematicTree};
use rs_dh_kinematics::utils::{dump_joints, dump_pose};

/// Moves the effector of a YAML described chain to a target point.
#[derive(Parser, Debug)]
#[command(name = "dh-ik", version, about)]
struct Args {
    /// YAML chain description
    file: PathBuf,

    /// Target point, world coordinates
    #[arg(short, long, value_parser = parse_point, allow_hyphen_values = true)]
    target: Point3<f64>,

    /// Effector joint name. Defaults to the end of the main chain.
    #[arg(short, long)]
    effector: Option<String>,

    /// Move at most this far per step, printing each step, instead of solving at once
    #[arg(short, long)]
    step: Option<f64>,

    /// Give up stepping after this many steps
    #[arg(long, default_value_t = 1000)]
    max_steps: usize,
}

fn parse_point(text: &str) -> Result<Point3<f64>, String> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got '{}'", text)),
    }
}

/// Deepest joint following the first branch from the root.
fn end_of_chain(tree: &KinematicTree, root: JointId) -> JointId {
    let mut joint = root;
    while let Some(next) = tree.next_joint(joint) {
        joint = next;
    }
    joint
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let (mut tree, root) = KinematicTree::from_yaml_file(&args.file)
        .with_context(|| format!("Failed to load chain from {}", args.file.display()))?;

    let effector = match &args.effector {
        Some(name) => tree
            .find(name)
            .with_context(|| format!("No joint named '{}' in {}", name, args.file.display()))?,
        None => end_of_chain(&tree, root),
    };
    let solver = tree
        .get_ik(effector)
        .with_context(|| format!("No IK solver for {}", tree.joint(effector).name))?;
    println!("Effector {} solved by {}", tree.path(effector, "/"), solver.kind().name());

    let target = Position::Point(args.target);
    let p_eff = Point3::origin();
    let reached = match args.step {
        None => solver.solve_position(&mut tree, effector, &p_eff, &target),
        Some(distance) if distance > 0.0 => {
            let mut result = StepResult::Progress;
            for step in 1..=args.max_steps {
                result = solver.step_position(&mut tree, effector, &p_eff, &target, distance);
                let p = tree.world_position(effector);
                println!("Step {}: {:?} at {:.4}, {:.4}, {:.4}", step, result, p.x, p.y, p.z);
                if result.is_terminal() {
                    break;
                }
            }
            result == StepResult::Success
        }
        Some(distance) => bail!("Step distance must be positive, got {}", distance),
    };

    let mobile: Vec<JointId> = std::iter::once(effector)
        .chain(tree.ancestors(effector))
        .filter(|joint| tree.joint(*joint).is_mobile())
        .collect();
    for joint in mobile.iter().rev() {
        let joint = tree.joint(*joint);
        println!("{:>16}: {:.6}", joint.name, joint.q());
    }
    print!("Joints (deg): ");
    dump_joints(&mobile.iter().rev().map(|joint| tree.q(*joint)).collect::<Vec<_>>());
    print!("Effector pose: ");
    dump_pose(&tree.full_t(effector));

    if reached {
        println!("Target reached");
    } else {
        println!("Target not reached, {:.4} away", (tree.world_position(effector) - args.target).norm());
    }
    Ok(())
}
