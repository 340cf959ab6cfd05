use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process;

use anyhow::Context as _;
use gyro_cube::{
    config::ViewerConfig,
    flow::{self, ExitReason},
    pump::OrientationPump,
    resources::mesh::build_cube,
};

const USAGE: &str = "usage: gyro-cube <serial-device | ->";

fn open_input(path: &str) -> anyhow::Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let port = File::open(path).with_context(|| format!("could not open {}", path))?;
    Ok(Box::new(BufReader::new(port)))
}

fn main() -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }

    let path = std::env::args().nth(1).context(USAGE)?;
    let input = open_input(&path)?;
    let cube = build_cube()?;
    let config = ViewerConfig::default();

    let mut pump = OrientationPump::new();
    pump.start(move |link| match flow::run(config, cube, link) {
        Ok(ExitReason::Stopped) => (),
        Ok(ExitReason::WindowClosed) => process::exit(1),
        Err(e) => {
            log::error!("Render loop failed: {:#}", e);
            process::exit(1);
        }
    })?;

    log::info!("Reading telemetry from {}", path);
    let published = pump.run_to_end(input)?;
    log::info!("Telemetry ended after {} samples", published);
    Ok(())
}
