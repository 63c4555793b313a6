use std::error::Error;
use std::io::{self, Write};

use colored::Colorize;
use log::{debug, error, warn};

use crate::shell::executor::Executor;
use crate::shell::job_manager::JobManager;
use crate::shell::parser::{ParseError, Parser};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::utils::config::Config;

pub struct Shell<'a> {
    readline: ReadlineManager<'a>,
    executor: Executor,
}

enum InputOutcome {
    Done,
    NeedMore,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        Ok(Self {
            readline: ReadlineManager::new(config)?,
            executor: Executor::new(JobManager::new()),
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("starting minnow");
        self.readline.load_history()?;
        self.run_loop()?;
        self.readline.save_history()?;
        debug!("leaving minnow");
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        // a logical line may span several physical lines; the unfinished
        // part waits here for its continuation
        let mut pending = String::new();
        loop {
            io::stdout().flush()?;
            for finished in self.executor.reap_background() {
                println!("{}", finished);
            }

            let prompt = if pending.is_empty() {
                "minnow> ".bright_cyan().to_string()
            } else {
                "> ".bright_cyan().to_string()
            };
            match self.readline.readline(&prompt) {
                Ok(line) => {
                    if !pending.is_empty() {
                        pending.push('\n');
                    }
                    pending.push_str(&line);
                    if pending.trim().is_empty() {
                        pending.clear();
                        continue;
                    }
                    let input = std::mem::take(&mut pending);
                    if let InputOutcome::NeedMore = self.handle_input(&input)? {
                        pending = input;
                    }
                }
                Err(ReadlineError::Eof) => {
                    warn!("received EOF, leaving");
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    pending.clear();
                }
                Err(err) => {
                    error!("readline failed: {}", err);
                    eprintln!("{} {}", "✗".red(), err.to_string().bright_red());
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, input: &str) -> Result<InputOutcome, Box<dyn Error>> {
        let mut parser = Parser::new(input);
        match parser.parse_line() {
            Ok(line) => {
                self.readline.add_history(input.to_string())?;
                match self.executor.execute(&line) {
                    Ok(status) => {
                        if !status.is_success() {
                            debug!("line finished with status {}", status);
                        }
                    }
                    Err(err) => {
                        eprintln!("{} {}", "✗".red(), err.to_string().bright_red());
                    }
                }
                Ok(InputOutcome::Done)
            }
            Err(ParseError::Incomplete) => Ok(InputOutcome::NeedMore),
            Err(err @ ParseError::Malformed(_)) => {
                self.readline.add_history(input.to_string())?;
                eprintln!("{} {}", "✗".red(), err.to_string().bright_red());
                Ok(InputOutcome::Done)
            }
        }
    }
}
