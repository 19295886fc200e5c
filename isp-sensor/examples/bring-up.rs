use std::env;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Context;
use linux_embedded_hal::{Delay, I2cdev};

use isp_sensor::{registry, SensorArena, SharedI2c};

fn parse_address(arg: &str) -> anyhow::Result<u8> {
    let address = if let Some(hex_digits) = arg.strip_prefix("0x") {
        u8::from_str_radix(hex_digits, 16)?
    } else {
        arg.parse()?
    };
    Ok(address)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 5 {
        println!("Usage: <sensor name> <I2C bus path> [sensor address] [mode]");
        println!("Known sensors:");
        for config in registry::drivers() {
            println!("  {} (id {:#08X})", config.name(), config.chip_id());
        }
        return Ok(());
    }
    let config = registry::lookup(&args[1]).with_context(|| format!("looking up {}", args[1]))?;
    let mut instance = config.instance_config();
    if let Some(address) = args.get(3) {
        instance = instance.at(instance.bus.bus_id, parse_address(address)?);
    }
    let mode_index: u8 = match args.get(4) {
        Some(mode) => mode.parse()?,
        None => 0,
    };

    let bus = I2cdev::new(&args[2]).with_context(|| format!("opening {}", args[2]))?;
    let shared = SharedI2c::new(instance.bus.bus_id, bus);
    let mut arena: SensorArena<_, 1> = SensorArena::new(&shared);
    let handle = arena.create(config, &instance)?;
    let sensor = arena.get_mut(handle)?;

    sensor.check_connection()?;
    if let Some(caps) = config.model().caps() {
        println!(
            "{}: {}x{} max, {} modes",
            config.name(),
            caps.max_bounds.width,
            caps.max_bounds.height,
            caps.mode_count
        );
    }
    let descriptor = sensor.enum_mode(usize::from(mode_index))?;
    println!("Mode {}: {:?}", mode_index, descriptor);

    sensor.open(descriptor.index, &mut Delay)?;
    sensor.set_fps(descriptor.fps)?;
    let info = sensor.ae_base_info()?;
    let channels = descriptor.channels();
    let gains = vec![2.0f32; channels];
    sensor.set_a_gain(&gains)?;
    // Half a frame of integration on every channel
    let int_times = vec![info.max_integration_lines as f32 * info.one_line_exp_time / 2.0; channels];
    sensor.set_int_time(&int_times)?;
    sensor.set_streaming(true)?;

    let info = sensor.ae_base_info()?;
    println!("Analog gain:      {:?}", &info.a_gain[..]);
    println!("Digital gain:     {:?}", &info.d_gain[..]);
    println!("Integration time: {:?}", &info.int_time[..]);
    println!(
        "{} fps ({} to {}), {} lines per frame",
        info.fps, info.min_fps, info.max_fps, info.frame_length_lines
    );

    sleep(Duration::from_secs(2));
    arena.close(handle)?;
    arena.release(handle)?;
    Ok(())
}
