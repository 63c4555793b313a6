use std::fmt;

/// One parsed logical line: an expression chain plus the line-wide
/// redirection target and background flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    pub exprs: Vec<Expr>,
    pub redirect: RedirectionTarget,
    pub background: bool,
}

// The chain always starts and ends with a Command and never holds two
// adjacent separators; the parser enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Command(Command),
    Pipe,
    And,
    Or,
}

/// A single command stage. `args[0]` is the executable name.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub executable: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectionTarget {
    Inherit,
    Truncate(String),
    Append(String),
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.exprs.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match expr {
                Expr::Command(cmd) => write!(f, "{}", cmd.args.join(" "))?,
                Expr::Pipe => f.write_str("|")?,
                Expr::And => f.write_str("&&")?,
                Expr::Or => f.write_str("||")?,
            }
        }
        match &self.redirect {
            RedirectionTarget::Inherit => {}
            RedirectionTarget::Truncate(path) => write!(f, " > {}", path)?,
            RedirectionTarget::Append(path) => write!(f, " >> {}", path)?,
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}
