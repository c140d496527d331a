// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Corgi host binary: loads a Smalltalk image and runs it.

use anyhow::{Context, Result};
use clap::Parser;
use corgi_vm::platform::HostPlatform;
use corgi_vm::{Interpreter, image};
use log::{error, info};
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

/// Default arena size when the image does not dictate more.
const DEFAULT_ARENA_BYTES: u64 = 512 * 1024 * 1024;

/// Corgi Smalltalk VM.
#[derive(Debug, Parser)]
#[command(name = "corgi", version)]
struct Args {
    /// Application websocket port (served by a host-side collaborator).
    #[arg(short = 'p', default_value_t = 5000)]
    port: u16,

    /// Debug websocket port, used when the image carries the
    /// development flag.
    #[arg(short = 'd', default_value_t = 5100)]
    debug_port: u16,

    /// The image file to run.
    image: String,
}

fn run(args: &Args) -> Result<()> {
    let file = File::open(&args.image)
        .with_context(|| format!("could not open image {}", args.image))?;
    let mut reader = BufReader::new(file);

    let mem = image::load_image(&mut reader, DEFAULT_ARENA_BYTES, &args.image)
        .with_context(|| format!("could not load image {}", args.image))?;
    info!("image loaded successfully");

    if mem.development {
        info!(
            "development image; application port {}, debug port {}",
            args.port, args.debug_port
        );
    }

    let mut interpreter = Interpreter::new(mem, Box::new(HostPlatform));
    interpreter.launch().context("image launch failed")?;

    loop {
        interpreter.interpret().context("interpretation failed")?;

        if interpreter.finish_requested {
            info!("image requested termination");
            return Ok(());
        }
        if !interpreter.error_string.is_empty() {
            error!("{}", interpreter.error_string);
            interpreter.error_string.clear();
            continue;
        }
        if interpreter.breakpoint_hit {
            // The debugger collaborator is not part of the core; a halt
            // without one terminates the session.
            error!("halt without a debugger attached");
            return Ok(());
        }
        if interpreter.suspended {
            // No event sources are wired in this host; a suspended
            // image has nothing left to wake it.
            info!("image suspended; exiting");
            return Ok(());
        }
        return Ok(());
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            error!("{report:#}");
            ExitCode::FAILURE
        }
    }
}
