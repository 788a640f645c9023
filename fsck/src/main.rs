//! The `fsck` tool compacts a WFS image offline: it retains only the
//! latest live log entry per inode and rewrites the log contiguously,
//! staging the result and swapping it in atomically.

use std::env;
use std::path::PathBuf;
use std::process::exit;

fn print_usage(bin: &str) {
	eprintln!("Usage:");
	eprintln!(" {bin} [-h]");
	eprintln!(" {bin} image_path");
}

fn main() {
	let args: Vec<String> = env::args().collect();
	let bin = args.first().map(String::as_str).unwrap_or("fsck");

	let positional: Vec<&str> = args[1..].iter().map(String::as_str).collect();
	let image_path = match positional[..] {
		["-h"] | ["--help"] => {
			print_usage(bin);
			exit(0);
		}
		[path] => PathBuf::from(path),
		_ => {
			print_usage(bin);
			exit(1);
		}
	};

	let report = wfs_core::compact::compact(&image_path).unwrap_or_else(|e| {
		eprintln!("{bin}: {}: {}", image_path.display(), e);
		exit(1);
	});

	println!(
		"{}: {} entries seen, {} retained, head {} -> {}",
		image_path.display(),
		report.entries_seen,
		report.entries_retained,
		report.head_before,
		report.head_after,
	);
}
