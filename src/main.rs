//! guided-sim: headless guided convergence demo
//!
//! Plays one round of roulette or craps with reference bodies, delivers the
//! outcome from a simulated network after a delay and prints the final frame
//! report as JSON.
//!
//! Usage: guided-sim [roulette|craps] [round_id] [outcome] [delay_ms] [--skip]
//!   roulette outcome: pocket 0-37 (37 is 00)
//!   craps outcome:    two faces, e.g. 4,3

use std::process::ExitCode;

use glam::{Quat, Vec3};

use guided_convergence::body::SimpleBody;
use guided_convergence::consts::{MAX_SUBSTEPS, SIM_DT};
use guided_convergence::games::{DiceLayout, DicePair, RouletteLayout, RoulettePocket, TargetResolver};
use guided_convergence::guidance::{FrameReport, FrameStepper, GuidanceStore, Outcome, RoundPhase};
use guided_convergence::{EngineConfig, LogSink};

/// Display refresh the host loop pretends to run at
const FRAME_DT: f32 = 1.0 / 60.0;

struct Options {
    game: String,
    round_id: u64,
    outcome: Option<String>,
    delay_ms: f64,
    skip: bool,
}

impl Options {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut positional = Vec::new();
        let mut skip = false;
        for arg in args {
            match arg.as_str() {
                "--skip" => skip = true,
                "-h" | "--help" => return Err("usage".to_string()),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let game = positional.next().unwrap_or_else(|| "roulette".to_string());
        let round_id = match positional.next() {
            Some(s) => s.parse().map_err(|_| format!("bad round id: {}", s))?,
            None => 1,
        };
        let outcome = positional.next();
        let delay_ms = match positional.next() {
            Some(s) => s.parse().map_err(|_| format!("bad delay: {}", s))?,
            None => 800.0,
        };

        Ok(Self {
            game,
            round_id,
            outcome,
            delay_ms,
            skip,
        })
    }
}

fn parse_pocket(text: Option<&str>) -> Result<RoulettePocket, String> {
    let pocket = match text {
        Some("00") => RoulettePocket::DOUBLE_ZERO,
        Some(s) => RoulettePocket(s.parse().map_err(|_| format!("bad pocket: {}", s))?),
        None => RoulettePocket(17),
    };
    if !pocket.is_valid() {
        return Err(format!("pocket out of range: {}", pocket.0));
    }
    Ok(pocket)
}

fn parse_dice(text: Option<&str>) -> Result<DicePair, String> {
    let Some(text) = text else {
        return Ok(DicePair::new(4, 3));
    };
    let (a, b) = text.split_once(',').ok_or_else(|| format!("bad dice: {}", text))?;
    let die1 = a.trim().parse().map_err(|_| format!("bad die: {}", a))?;
    let die2 = b.trim().parse().map_err(|_| format!("bad die: {}", b))?;
    let dice = DicePair::new(die1, die2);
    if !dice.is_valid() {
        return Err(format!("dice out of range: {}", text));
    }
    Ok(dice)
}

/// Run one round to Reveal (or until the hard stop) and return the last report
#[allow(clippy::too_many_arguments)]
fn simulate<O, R>(
    game: &str,
    round_id: u64,
    bodies: &mut [SimpleBody],
    resolver: &R,
    launch: Vec3,
    outcome: O,
    delay_ms: f64,
    skip: bool,
) -> Option<FrameReport>
where
    O: Outcome + 'static,
    R: TargetResolver<O>,
{
    let mut store: GuidanceStore<O> = GuidanceStore::new(EngineConfig::default());
    store.add_sink(LogSink);
    let mut stepper = FrameStepper::new();

    // The network side only ever talks through the handle
    let network = store.handle();
    let mut outcome = Some(outcome);

    let profile = store.profile(game)?.clone();
    let hard_stop = profile.max_animation_ms + profile.late_settle_ms.max(delay_ms) + 1000.0;

    let mut now_ms = 0.0;
    if let Err(err) = store.start_round(game, round_id, Some(launch), now_ms) {
        log::error!("could not start round: {}", err);
        return None;
    }
    if skip {
        network.request_skip(game);
    }

    let mut accumulator = 0.0;
    let mut last = None;
    while now_ms < hard_stop {
        accumulator += FRAME_DT;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            if now_ms >= delay_ms {
                if let Some(outcome) = outcome.take() {
                    if let Err(err) = network.receive_outcome(game, outcome) {
                        log::error!("outcome rejected at the boundary: {}", err);
                    }
                }
            }

            let report = stepper.step(&mut store, game, bodies, resolver, now_ms, SIM_DT);
            for body in bodies.iter_mut() {
                body.integrate(SIM_DT);
            }
            let finished = report.phase == RoundPhase::Reveal;
            last = Some(report);
            if finished {
                return last;
            }

            accumulator -= SIM_DT;
            substeps += 1;
            now_ms += SIM_DT as f64 * 1000.0;
        }
    }

    log::warn!("[{}] round {} did not reach Reveal", game, round_id);
    last
}

fn run(options: &Options) -> Result<FrameReport, String> {
    let report = match options.game.as_str() {
        "roulette" => {
            let pocket = parse_pocket(options.outcome.as_deref())?;
            let layout = RouletteLayout::default();
            let mut bodies = [SimpleBody::new(Vec3::new(0.45, 0.0, 0.0))];
            simulate(
                "roulette",
                options.round_id,
                &mut bodies,
                &layout,
                Vec3::new(0.0, 0.0, 1.6),
                pocket,
                options.delay_ms,
                options.skip,
            )
        }
        "craps" => {
            let dice = parse_dice(options.outcome.as_deref())?;
            let layout = DiceLayout::default();
            let mut bodies = [
                SimpleBody::new(Vec3::new(-0.05, 0.3, -0.3)).with_angular_velocity(Vec3::new(6.0, 2.0, -4.0)),
                SimpleBody::new(Vec3::new(0.05, 0.3, -0.3)).with_angular_velocity(Vec3::new(-5.0, 3.0, 7.0)),
            ];
            bodies[1].rot = Quat::from_rotation_y(0.7);
            simulate(
                "craps",
                options.round_id,
                &mut bodies,
                &layout,
                Vec3::new(0.0, 1.2, 1.4),
                dice,
                options.delay_ms,
                options.skip,
            )
        }
        other => return Err(format!("unknown game: {} (expected roulette or craps)", other)),
    };
    report.ok_or_else(|| format!("no frames simulated for {}", options.game))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            if err != "usage" {
                eprintln!("{}", err);
            }
            eprintln!("usage: guided-sim [roulette|craps] [round_id] [outcome] [delay_ms] [--skip]");
            return ExitCode::from(2);
        }
    };
    log::info!("guided-sim: {} round {}", options.game, options.round_id);

    match run(&options).and_then(|report| serde_json::to_string_pretty(&report).map_err(|e| e.to_string())) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
