use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use nix::unistd;
use once_cell::sync::Lazy;

use super::error::{BuiltinError, ExitStatus};

/// A builtin runs synchronously inside the calling process and writes to
/// whatever descriptor currently occupies the standard-output slot.
pub type Handler = fn(&[String]) -> Result<ExitStatus, BuiltinError>;

static REGISTRY: Lazy<HashMap<&'static str, Handler>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Handler> = HashMap::new();
    map.insert("cd", builtin_cd);
    map.insert("exit", builtin_exit);
    map.insert("pwd", builtin_pwd);
    map.insert("true", builtin_true);
    map.insert("false", builtin_false);
    map.insert("echo", builtin_echo);
    map
});

pub fn lookup(name: &str) -> Option<Handler> {
    REGISTRY.get(name).copied()
}

fn builtin_cd(args: &[String]) -> Result<ExitStatus, BuiltinError> {
    let operands = &args[1..];
    if operands.len() > 1 {
        return Err(BuiltinError::Usage("cd", "too many arguments"));
    }
    let target = operands
        .first()
        .ok_or_else(|| BuiltinError::Usage("cd", "not enough arguments"))?;
    let target = shellexpand::tilde(target);
    unistd::chdir(Path::new(target.as_ref())).map_err(|err| BuiltinError::Sys("cd", err))?;
    Ok(ExitStatus::SUCCESS)
}

// Terminates the whole process, outstanding children included. A
// non-numeric code is taken as 0.
fn builtin_exit(args: &[String]) -> Result<ExitStatus, BuiltinError> {
    let operands = &args[1..];
    if operands.len() > 1 {
        return Err(BuiltinError::Usage("exit", "too many arguments"));
    }
    let code = operands
        .first()
        .map(|operand| operand.parse::<i32>().unwrap_or(0))
        .unwrap_or(0);
    process::exit(code);
}

fn builtin_pwd(args: &[String]) -> Result<ExitStatus, BuiltinError> {
    if args.len() > 1 {
        return Err(BuiltinError::Usage("pwd", "too many arguments"));
    }
    let cwd = unistd::getcwd().map_err(|err| BuiltinError::Sys("pwd", err))?;
    // written through the raw handle so it reaches whatever descriptor
    // currently occupies the stdout slot
    writeln!(io::stdout(), "{}", cwd.display()).map_err(|err| BuiltinError::Io("pwd", err))?;
    Ok(ExitStatus::SUCCESS)
}

fn builtin_true(_args: &[String]) -> Result<ExitStatus, BuiltinError> {
    Ok(ExitStatus::SUCCESS)
}

fn builtin_false(_args: &[String]) -> Result<ExitStatus, BuiltinError> {
    Ok(ExitStatus::FAILURE)
}

fn builtin_echo(args: &[String]) -> Result<ExitStatus, BuiltinError> {
    writeln!(io::stdout(), "{}", args[1..].join(" ")).map_err(|err| BuiltinError::Io("echo", err))?;
    Ok(ExitStatus::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        for name in ["cd", "exit", "pwd", "true", "false", "echo"] {
            assert!(lookup(name).is_some(), "{} should be a builtin", name);
        }
        assert!(lookup("ls").is_none());
        assert!(lookup("").is_none());
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_true_and_false() {
        assert!(matches!(
            builtin_true(&args(&["true"])),
            Ok(ExitStatus::SUCCESS)
        ));
        assert!(matches!(
            builtin_false(&args(&["false"])),
            Ok(ExitStatus::FAILURE)
        ));
    }

    #[test]
    fn test_cd_arity_errors() {
        assert!(matches!(
            builtin_cd(&args(&["cd"])),
            Err(BuiltinError::Usage("cd", _))
        ));
        assert!(matches!(
            builtin_cd(&args(&["cd", "a", "b"])),
            Err(BuiltinError::Usage("cd", _))
        ));
    }

    #[test]
    fn test_cd_missing_directory() {
        assert!(matches!(
            builtin_cd(&args(&["cd", "/definitely/not/a/directory"])),
            Err(BuiltinError::Sys("cd", _))
        ));
    }

    #[test]
    fn test_pwd_rejects_operands() {
        assert!(matches!(
            builtin_pwd(&args(&["pwd", "x"])),
            Err(BuiltinError::Usage("pwd", _))
        ));
    }
}
