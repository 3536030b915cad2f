mod bookmarks;
mod builtins;
mod fmtbuf;
mod history;
mod jobs;
mod launch;
mod plan;
mod repl;
mod signals;
mod subst;
mod sys;
mod token;

use std::fs::File;
use std::io::{self, BufReader};

use repl::ReplOptions;

struct Cli {
    prompt: bool,
    script: Option<String>,
}

fn parse_args(argv: &[String]) -> Result<Cli, String> {
    let mut prompt = true;
    let mut script = None;

    for arg in argv {
        match arg.as_str() {
            "-h" => return Err(usage()),
            "-p" => prompt = false,
            other if script.is_none() => script = Some(other.to_string()),
            other => return Err(format!("tsh: unexpected argument: {other}\n{}", usage())),
        }
    }

    Ok(Cli { prompt, script })
}

fn usage() -> String {
    "usage: tsh [-h] [-p] [script]".to_string()
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&argv) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };

    jobs::init_global(jobs::DEFAULT_CAPACITY);
    if let Err(e) = signals::install() {
        eprintln!("tsh: failed to install signal handlers: {e}");
        std::process::exit(1);
    }

    let status = match &cli.script {
        Some(path) => match File::open(path) {
            Ok(file) => {
                let opts = ReplOptions { prompt: false, echo: true };
                repl::run(BufReader::new(file), &opts)
            }
            Err(e) => {
                eprintln!("tsh: {path}: {e}");
                1
            }
        },
        None => {
            let opts = ReplOptions { prompt: cli.prompt, echo: false };
            repl::run(io::stdin().lock(), &opts)
        }
    };

    std::process::exit(status);
}
