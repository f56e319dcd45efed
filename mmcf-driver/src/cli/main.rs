use clap::{Arg, ArgAction, ArgMatches, Command, value_parser, ValueEnum};
use log::info;
use mmcf::sim::{ImageStore, SectorStore, SimDma, SimulatedCard};
use mmcf::{CfDriver, Config, DiscInterface, DmaChannel, SECTOR_SIZE, TransferMode};
use mmcf_utils::file::{Output, TransientFile};
use mmcf_utils::hexdump;
use simplelog::{ConfigBuilder, LevelFilter, LevelPadding, WriteLogger};
use std::fs::{self, File};
use std::io::{self, Write};
use time::macros::format_description;

const IMAGE_PATH: &str = "IMAGE_PATH";
const MODE: &str = "MODE";
const TIMEOUT: &str = "TIMEOUT";
const LOG_PATH: &str = "LOG_PATH";
const LOG_LEVEL: &str = "LOG_LEVEL";
const LBA: &str = "LBA";
const COUNT: &str = "COUNT";
const OUTPUT_PATH: &str = "OUTPUT_PATH";
const INPUT_PATH: &str = "INPUT_PATH";
const SECTORS: &str = "SECTORS";

/// How sector data is moved.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum Mode {
    Unaligned,
    Direct,
    Dma,
}

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
}

type Card = SimulatedCard<ImageStore>;

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .max_term_width(100)
        .after_help("\
Runs the CompactFlash driver against a simulated adapter backed by a card \
image on the host. Images are plain files holding a whole number of \
512-byte sectors; use the create command to make a blank one.")
        .subcommand_required(true)
        .arg(Arg::new(IMAGE_PATH)
            .help("The card image to use.")
            .short('i')
            .long("image")
            .action(ArgAction::Set)
            .required(true))
        .arg(Arg::new(MODE)
            .help("How to move sector data. Defaults to the build's default mode.")
            .short('m')
            .long("mode")
            .action(ArgAction::Set)
            .value_parser(value_parser!(Mode))
            .ignore_case(true))
        .arg(Arg::new(TIMEOUT)
            .help("Status samples each wait may take before giving up.")
            .short('t')
            .long("timeout")
            .action(ArgAction::Set)
            .value_parser(value_parser!(u32).range(1..)))
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .action(ArgAction::Set))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .action(ArgAction::Set)
            .default_value("trace")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true))
        .subcommand(Command::new("probe")
            .about("Look for the adapter and a card, then leave it idle."))
        .subcommand(Command::new("read")
            .about("Read sectors. Prints a hex dump unless --output is given.")
            .arg(Arg::new(LBA)
                .help("The first sector to read.")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(COUNT)
                .help("How many sectors to read (1 to 256).")
                .short('n')
                .long("count")
                .action(ArgAction::Set)
                .default_value("1")
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(OUTPUT_PATH)
                .help("Write the raw sector bytes to this file instead.")
                .short('o')
                .long("output")
                .action(ArgAction::Set)))
        .subcommand(Command::new("write")
            .about("Write a file to the card, padded with zeroes to whole sectors.")
            .arg(Arg::new(LBA)
                .help("The first sector to write.")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(INPUT_PATH)
                .help("The file to write (at most 256 sectors).")
                .action(ArgAction::Set)
                .required(true)))
        .subcommand(Command::new("create")
            .about("Create a blank card image, replacing any existing file.")
            .arg(Arg::new(SECTORS)
                .help("The size of the image in sectors.")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32).range(1..))))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:6]"))
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<String>(LOG_PATH) {
            let logfile = File::create(log_path)
                .map_err(|e| format!("Failed to create log file: {}", e))?;
            let level = match args.get_one::<LogLevel>(LOG_LEVEL).unwrap() {
                LogLevel::Trace => LevelFilter::Trace,
                LogLevel::Debug => LevelFilter::Debug,
                LogLevel::Info => LevelFilter::Info,
            };
            init_logging(logfile, level)?;
        }

        let image_path = args.get_one::<String>(IMAGE_PATH).unwrap();
        let (command, sub_args) = args.subcommand().unwrap();

        // Creating an image needs no driver.
        if command == "create" {
            let sectors = *sub_args.get_one::<u32>(SECTORS).unwrap();
            ImageStore::create(image_path, sectors)
                .map_err(|e| format!("Failed to create image '{}': {}", image_path, e))?;
            println!("Created '{}' with {} sectors.", image_path, sectors);
            return Ok(());
        }

        let store = ImageStore::open(image_path)
            .map_err(|e| format!("Failed to open image '{}': {}", image_path, e))?;
        info!("Using image '{}'.", image_path);
        let card = SimulatedCard::new(store);

        let mut config = Config::default();
        if let Some(&timeout) = args.get_one::<u32>(TIMEOUT) {
            config = config.with_timeout(timeout);
        }
        match args.get_one::<Mode>(MODE) {
            Some(Mode::Dma) => {
                execute(CfDriver::with_dma(card, SimDma::new(), config), command, sub_args)
            }
            mode => {
                let config = match mode {
                    Some(Mode::Unaligned) => config.with_mode(TransferMode::UnalignedSafe),
                    Some(Mode::Direct) => config.with_mode(TransferMode::Direct),
                    _ => config,
                };
                let driver = CfDriver::new(card, config).map_err(|e| e.to_string())?;
                execute(driver, command, sub_args)
            }
        }
    }
}

/// Run one card command with a ready-built driver.
fn execute<D: DmaChannel>(mut driver: CfDriver<Card, D>, command: &str,
                          args: &ArgMatches) -> Result<(), String> {
    info!("Running '{}' with {:?} transfers.", command, driver.mode());
    match command {
        "probe" => probe(&mut driver)?,
        "read" => read(&mut driver, args)?,
        "write" => write(&mut driver, args)?,
        _ => unreachable!(),
    }
    driver.shutdown().map_err(|e| e.to_string())
}

fn probe<D: DmaChannel>(driver: &mut CfDriver<Card, D>) -> Result<(), String> {
    driver.start_up().map_err(|e| e.to_string())?;
    if !driver.is_inserted() {
        return Err("No card inserted.".to_string());
    }
    driver.clear_status().map_err(|e| e.to_string())?;
    let device_type = driver.device_type();
    println!("Found {} card: {} sectors, features {:#04X}.",
             String::from_utf8_lossy(&device_type),
             driver.bus().backing().sector_count(),
             driver.features());
    Ok(())
}

fn read<D: DmaChannel>(driver: &mut CfDriver<Card, D>,
                       args: &ArgMatches) -> Result<(), String> {
    let lba = *args.get_one::<u32>(LBA).unwrap();
    let count = *args.get_one::<u32>(COUNT).unwrap();

    // Open the output first, so a bad path fails before touching the card.
    let mut output = match args.get_one::<String>(OUTPUT_PATH) {
        None => Output::Stdout(io::stdout()),
        Some(path) => {
            let f = TransientFile::create(path)
                .map_err(|e| format!("Failed to create output file '{}': {}", path, e))?;
            Output::File(f)
        }
    };

    let mut buf = vec![0; count.min(mmcf::MAX_SECTORS) as usize * SECTOR_SIZE];
    driver.read_sectors(lba, count, &mut buf).map_err(|e| e.to_string())?;

    // Raw bytes for a file, a readable dump for the terminal.
    let dump;
    let bytes = if matches!(output, Output::Stdout(_)) {
        dump = format!("{}\n", hexdump::sector_dump(&buf, SECTOR_SIZE, lba));
        dump.as_bytes()
    } else {
        &buf[..]
    };
    output.write_all(bytes)
        .map_err(|e| format!("Failed to write output: {}", e))?;
    if let Output::File(f) = &mut output {
        f.set_persist(true);
        info!("Wrote {} sector(s) to '{}'.", count, f.path().display());
    }
    Ok(())
}

fn write<D: DmaChannel>(driver: &mut CfDriver<Card, D>,
                        args: &ArgMatches) -> Result<(), String> {
    let lba = *args.get_one::<u32>(LBA).unwrap();
    let path = args.get_one::<String>(INPUT_PATH).unwrap();

    let mut data = fs::read(path)
        .map_err(|e| format!("Couldn't open input file '{}': {}", path, e))?;
    if data.is_empty() {
        return Err(format!("Input file '{}' is empty.", path));
    }
    let count = (data.len() + SECTOR_SIZE - 1) / SECTOR_SIZE;
    data.resize(count * SECTOR_SIZE, 0);

    driver.write_sectors(lba, count as u32, &data).map_err(|e| e.to_string())?;
    driver.bus_mut().backing_mut().sync()
        .map_err(|e| format!("Failed to save image: {}", e))?;
    println!("Wrote {} sector(s) at LBA {}.", count, lba);
    Ok(())
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use tempfile;

    macro_rules! invoke {
        ($($args:expr),+) => {{
            let args = cli().try_get_matches_from(
                    vec!["mmcf".to_string(), $($args.to_string()),*])
                .unwrap();
            run(args)
        }}
    }

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    /// Create, write, read back to a file, for every transfer mode.
    #[test]
    fn test_image_round_trip() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("card.img");
        let input = tempdir.path().join("in");
        let payload: Vec<u8> = (0..700).map(|i| (i * 7) as u8).collect();
        fs::write(&input, &payload).unwrap();

        assert_eq!(invoke!("-i", path_str(&image), "create", "16"), 0);
        assert_eq!(fs::metadata(&image).unwrap().len(), 16 * 512);

        for mode in ["unaligned", "direct", "dma"] {
            let out = tempdir.path().join(format!("out-{}", mode));
            assert_eq!(invoke!("-i", path_str(&image), "-m", mode,
                               "write", "3", path_str(&input)), 0);
            assert_eq!(invoke!("-i", path_str(&image), "--mode", mode,
                               "read", "3", "-n", "2", "-o", path_str(&out)), 0);
            let back = fs::read(&out).unwrap();
            assert_eq!(back.len(), 1024);
            assert_eq!(&back[..700], &payload[..]);
            assert!(back[700..].iter().all(|&b| b == 0));
        }
        assert_eq!(invoke!("-i", path_str(&image), "probe"), 0);
        assert_eq!(invoke!("-i", path_str(&image), "read", "0"), 0);
    }

    /// Ensure a failed read does not leave an output file behind.
    #[test]
    fn test_failed_read_output_delete() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("card.img");
        let out = tempdir.path().join("out");
        assert_eq!(invoke!("-i", path_str(&image), "create", "4"), 0);

        // Past the end of the card: the card never becomes ready.
        assert_eq!(invoke!("-i", path_str(&image), "-t", "1000",
                           "read", "3", "-n", "2", "-o", path_str(&out)), 1);
        assert!(fs::metadata(&out).is_err());

        assert_eq!(invoke!("-i", path_str(&image), "read", "0", "-n", "0",
                           "-o", path_str(&out)), 1);
        assert!(fs::metadata(&out).is_err());
    }

    #[test]
    fn test_bad_images() {
        let tempdir = tempfile::tempdir().unwrap();
        let missing = tempdir.path().join("missing.img");
        assert_eq!(invoke!("-i", path_str(&missing), "probe"), 1);

        let ragged = tempdir.path().join("ragged.img");
        fs::write(&ragged, [0u8; 100]).unwrap();
        assert_eq!(invoke!("-i", path_str(&ragged), "probe"), 1);

        let image = tempdir.path().join("card.img");
        assert_eq!(invoke!("-i", path_str(&image), "create", "2"), 0);
        let empty = tempdir.path().join("empty");
        fs::write(&empty, b"").unwrap();
        assert_eq!(invoke!("-i", path_str(&image), "write", "0", path_str(&empty)), 1);
    }

    #[test]
    fn test_bad_command_lines() {
        assert!(cli().try_get_matches_from(["mmcf", "probe"]).is_err());
        assert!(cli().try_get_matches_from(["mmcf", "-i", "x.img"]).is_err());
        assert!(cli().try_get_matches_from(
            ["mmcf", "-i", "x.img", "-m", "sideways", "probe"]).is_err());
        assert!(cli().try_get_matches_from(["mmcf", "-i", "x.img", "create", "0"]).is_err());
        assert!(cli().try_get_matches_from(["mmcf", "-i", "x.img", "-t", "0", "probe"]).is_err());
        assert!(cli().try_get_matches_from(["mmcf", "-i", "x.img", "-t", "1", "probe"]).is_ok());
        assert!(cli().try_get_matches_from(
            ["mmcf", "-i", "x.img", "-m", "DMA", "probe"]).is_ok());
    }

    #[test]
    fn test_log_file_written() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("card.img");
        let log = tempdir.path().join("mmcf.log");
        assert_eq!(invoke!("-i", path_str(&image), "create", "1"), 0);
        assert_eq!(invoke!("-i", path_str(&image), "-l", path_str(&log),
                           "-L", "DEBUG", "probe"), 0);
        let text = fs::read_to_string(&log).unwrap();
        assert!(text.contains("CompactFlash adapter found."));
    }
}
