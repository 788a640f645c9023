//! The `mkfs` tool initializes a WFS image: a superblock plus a root
//! directory log entry, written into an already-sized backing file.

use std::env;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::process::exit;

use utils::prompt::prompt;
use wfs_core::image::MAX_SIZE;
use wfs_core::superblock::SUPERBLOCK_SIZE;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,

	/// The path to the image file to initialize.
	image_path: Option<PathBuf>,

	/// The capacity to give the image, in bytes, if it does not already exist.
	size: u64,
}

fn parse_args() -> Args {
	let mut args = Args {
		size: MAX_SIZE,
		..Default::default()
	};
	let mut iter = env::args();

	args.prog = iter.next().unwrap_or("mkfs".to_owned());

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,

			"-s" | "--size" => {
				let Some(value) = iter.next() else {
					eprintln!("{}: {}: missing value", args.prog, arg);
					exit(1);
				};
				args.size = value.parse().unwrap_or_else(|_| {
					eprintln!("{}: {}: invalid size", args.prog, value);
					exit(1);
				});
			}

			_ => {
				if args.image_path.is_some() {
					eprintln!("{}: unexpected argument `{}`", args.prog, arg);
					exit(1);
				}
				args.image_path = Some(PathBuf::from(arg));
			}
		}
	}

	args
}

fn print_usage(bin: &str) {
	eprintln!("Usage:");
	eprintln!(" {bin} [-s size] image_path");
	eprintln!();
	eprintln!("Options:");
	eprintln!(" -h, --help:\t\tprints usage");
	eprintln!(" -s, --size:\t\tcapacity of a freshly created image, in bytes (default {MAX_SIZE})");
}

/// Tells whether `path` already holds a WFS image, by comparing its first
/// bytes against the superblock magic. Mirrors the `mkfs/src/ext2.rs`
/// `Ext2Factory::is_present` pattern: a tool that is about to destroy
/// whatever is on the device checks first and asks before proceeding.
fn is_present(path: &Path) -> bool {
	let Ok(mut file) = File::open(path) else {
		return false;
	};
	let mut magic = [0u8; 4];
	if file.read_exact(&mut magic).is_err() {
		return false;
	}
	u32::from_le_bytes(magic) == wfs_core::superblock::MAGIC
}

fn main() {
	let args = parse_args();
	if args.help {
		print_usage(&args.prog);
		exit(0);
	}

	let image_path = args.image_path.unwrap_or_else(|| {
		print_usage(&args.prog);
		exit(1);
	});

	if args.size == 0 || args.size > MAX_SIZE {
		eprintln!("{}: size must be between 1 and {MAX_SIZE}", args.prog);
		exit(1);
	}
	if args.size < SUPERBLOCK_SIZE as u64 {
		eprintln!("{}: size too small to hold a superblock", args.prog);
		exit(1);
	}

	if is_present(&image_path) {
		println!("{} already contains a WFS image", image_path.display());
		let confirm = prompt(Some("Proceed anyway? (y/N) "), false)
			.map(|s| s.to_lowercase() == "y")
			.unwrap_or(false);
		if !confirm {
			eprintln!("Abort.");
			exit(1);
		}
	}

	let file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(&image_path)
		.unwrap_or_else(|e| {
			eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
			exit(1);
		});
	file.set_len(args.size).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(1);
	});
	drop(file);

	wfs_core::image::Image::format(&image_path).unwrap_or_else(|e| {
		eprintln!("{}: failed to initialize image: {}", args.prog, e);
		exit(1);
	});
}
