//! Command-line demonstrator for `fitsio-url`: parses a URL the same way
//! the library's open path would, and prints the resulting plan.

use clap::Parser;
use fitsio_url::{parse_input, DriverRegistry};
use log::info;

#[derive(Parser)]
#[command(
    name = "fitsio-cli",
    about = "Parse a FITS-style URL and print the transport/extension/binning plan it describes"
)]
struct Args {
    /// The URL/filename to parse, e.g. "ftp:host/f.fits(cache.fits)[2][bin x,y]"
    url: String,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let registry = match DriverRegistry::init_library() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    info!("driver registry initialized");

    match parse_input(&args.url) {
        Ok(parsed) => {
            println!("urltype:   {}", parsed.urltype);
            println!("infile:    {}", parsed.infile);
            println!("outfile:   {}", parsed.outfile);
            println!("extspec:   {}", parsed.extspec);
            println!("rowfilter: {}", parsed.rowfilter);
            println!("binspec:   {}", parsed.binspec);
            println!("colspec:   {}", parsed.colspec);

            match registry.lookup(&parsed.urltype) {
                Ok(_) => println!("driver:    registered"),
                Err(e) => println!("driver:    {e}"),
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
