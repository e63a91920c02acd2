use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::{Input, Password};

/// Interactive input the authorization flow needs.
pub trait Prompter: Send + Sync {
    fn verification_code(&self) -> io::Result<String>;
    fn password(&self, hint: &str) -> io::Result<String>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn verification_code(&self) -> io::Result<String> {
        if !io::stdin().is_terminal() {
            return read_answer(io::stdin().lock(), &mut io::stderr(), "Enter the verification code you received: ");
        }
        let code: String = Input::new()
            .with_prompt("Enter the verification code you received")
            .interact_text()
            .map_err(dialoguer_to_io)?;
        Ok(code.trim().to_string())
    }

    fn password(&self, hint: &str) -> io::Result<String> {
        let prompt = if hint.trim().is_empty() {
            "Enter your 2FA password".to_string()
        } else {
            format!("Enter your 2FA password (hint: {})", hint.trim())
        };
        if !io::stdin().is_terminal() {
            return read_answer(io::stdin().lock(), &mut io::stderr(), &format!("{prompt}: "));
        }
        Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(dialoguer_to_io)
    }
}

fn dialoguer_to_io(error: dialoguer::Error) -> io::Error {
    io::Error::other(error)
}

/// Line-based fallback for piped stdin, where dialoguer cannot run.
fn read_answer<R: BufRead, W: Write>(mut input: R, output: &mut W, prompt: &str) -> io::Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed before an answer was given"));
    }
    Ok(line.trim().to_string())
}

/// Reads group names line by line until `done` or end of input. Blank lines
/// are skipped.
pub fn collect_group_names<R: BufRead, W: Write>(input: R, output: &mut W) -> io::Result<Vec<String>> {
    writeln!(output, "\n=== Group Names ===")?;
    writeln!(output, "Enter the names of the groups you want to fetch data from.")?;
    writeln!(output, "Type 'done' when you're finished adding groups.")?;

    let mut groups = Vec::new();
    let mut lines = input.lines();
    loop {
        write!(output, "Group {} name (or 'done' to finish): ", groups.len() + 1)?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let name = line?.trim().to_string();
        if name.eq_ignore_ascii_case("done") {
            break;
        }
        if !name.is_empty() {
            writeln!(output, "Added: {name}")?;
            groups.push(name);
        }
    }
    Ok(groups)
}
