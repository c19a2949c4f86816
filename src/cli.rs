// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::Parser;

/// asimi: a modal terminal AI coding assistant with a sandboxed project
/// shell.
#[derive(Debug, Parser)]
#[command(name = "asimi", version, about)]
pub struct Cli {
    /// Write debug logs to ./asimi.log
    #[arg(long)]
    pub debug: bool,

    /// One-shot mode: run a single prompt non-interactively and print the
    /// assistant's reply to stdout.
    #[arg(short = 'p', long = "prompt")]
    pub prompt: Option<String>,

    /// Raise logging to TRACE (implies --debug).
    #[arg(long)]
    pub trace: bool,
}
