use thiserror::Error;

use super::ast::{Command, CommandLine, Expr, RedirectionTarget};
use super::lexer::{Lexer, RedirectOp, Token};

/// `Incomplete` means the line so far is a valid prefix and the caller
/// should read a continuation line; `Malformed` lines are reported and
/// skipped.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    Incomplete,
    #[error("syntax error: {0}")]
    Malformed(String),
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    pub fn parse_line(&mut self) -> Result<CommandLine, ParseError> {
        let mut line = CommandLine {
            exprs: Vec::new(),
            redirect: RedirectionTarget::Inherit,
            background: false,
        };

        line.exprs.push(Expr::Command(self.parse_command(true)?));

        loop {
            match &self.current_token {
                Token::Eof => break,
                Token::Pipe => {
                    self.next_token();
                    let cmd = self.parse_command(false)?;
                    line.exprs.push(Expr::Pipe);
                    line.exprs.push(Expr::Command(cmd));
                }
                Token::And => {
                    self.next_token();
                    let cmd = self.parse_command(false)?;
                    line.exprs.push(Expr::And);
                    line.exprs.push(Expr::Command(cmd));
                }
                Token::Or => {
                    self.next_token();
                    let cmd = self.parse_command(false)?;
                    line.exprs.push(Expr::Or);
                    line.exprs.push(Expr::Command(cmd));
                }
                Token::Redirect(op) => {
                    let op = op.clone();
                    line.redirect = self.parse_redirection(op)?;
                }
                Token::Background => {
                    self.next_token();
                    if self.current_token != Token::Eof {
                        return Err(ParseError::Malformed(
                            "'&' must end the command line".to_string(),
                        ));
                    }
                    line.background = true;
                    break;
                }
                Token::Unterminated => return Err(ParseError::Incomplete),
                Token::Unsupported(c) => {
                    return Err(ParseError::Malformed(format!("unexpected '{}'", c)))
                }
                Token::Word(word) => {
                    return Err(ParseError::Malformed(format!(
                        "unexpected word '{}' after redirection",
                        word
                    )))
                }
            }
        }

        Ok(line)
    }

    // A command is a word followed by its argument words. `first` controls
    // what a missing word means: an empty line is malformed, but a line
    // ending right after a separator is merely incomplete.
    fn parse_command(&mut self, first: bool) -> Result<Command, ParseError> {
        let executable = match &self.current_token {
            Token::Word(word) => word.clone(),
            Token::Eof if first => {
                return Err(ParseError::Malformed("missing command".to_string()))
            }
            Token::Eof | Token::Unterminated => return Err(ParseError::Incomplete),
            Token::Unsupported(c) => {
                return Err(ParseError::Malformed(format!("unexpected '{}'", c)))
            }
            token => {
                return Err(ParseError::Malformed(format!(
                    "expected command, found '{:?}'",
                    token
                )))
            }
        };
        self.next_token();

        let mut args = vec![executable.clone()];
        while let Token::Word(word) = &self.current_token {
            args.push(word.clone());
            self.next_token();
        }

        Ok(Command { executable, args })
    }

    // The target of the last `>`/`>>` on the line wins.
    fn parse_redirection(&mut self, op: RedirectOp) -> Result<RedirectionTarget, ParseError> {
        self.next_token();

        match &self.current_token {
            Token::Word(path) => {
                let target = match op {
                    RedirectOp::Truncate => RedirectionTarget::Truncate(path.clone()),
                    RedirectOp::Append => RedirectionTarget::Append(path.clone()),
                };
                self.next_token();
                Ok(target)
            }
            Token::Eof | Token::Unterminated => Err(ParseError::Incomplete),
            _ => Err(ParseError::Malformed(
                "expected file name after redirection operator".to_string(),
            )),
        }
    }
}
