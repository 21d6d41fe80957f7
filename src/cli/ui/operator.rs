//! Terminal operator: shows candidates on stdout and reads decisions from stdin

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use console::style;

use crate::session::{DecisionChoice, Operator, OperatorDecision};
use crate::types::{AssistError, CandidateManifest, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    fn present(&self, candidate: &CandidateManifest) {
        println!("{}", candidate);
    }

    async fn decide(&self, allow_reprompt: bool) -> Result<OperatorDecision> {
        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let stdout = io::stdout();
            prompt_decision(&mut stdin.lock(), &mut stdout.lock(), allow_reprompt)
        })
        .await
        .map_err(|e| AssistError::Io(io::Error::other(e)))?
    }
}

/// Ask until a valid choice is entered; end of input counts as an interrupt
pub(crate) fn prompt_decision(
    input: &mut impl BufRead,
    output: &mut impl Write,
    allow_reprompt: bool,
) -> Result<OperatorDecision> {
    let menu = DecisionChoice::menu(allow_reprompt);

    loop {
        writeln!(output)?;
        for (i, choice) in menu.iter().enumerate() {
            writeln!(output, "  {}) {}", i + 1, choice)?;
        }
        write!(output, "{} ", style("Would you like to apply this?").bold())?;
        output.flush()?;

        let line = read_line(input, "decision prompt")?;
        match DecisionChoice::parse(&line, &menu) {
            Some(DecisionChoice::Apply) => return Ok(OperatorDecision::Apply),
            Some(DecisionChoice::DontApply) => return Ok(OperatorDecision::Decline),
            Some(DecisionChoice::Reprompt) => {
                let clarification = prompt_clarification(input, output)?;
                return Ok(OperatorDecision::Reprompt { clarification });
            }
            None => writeln!(
                output,
                "{} '{}' is not one of the choices",
                style("⚠").yellow(),
                line.trim()
            )?,
        }
    }
}

fn prompt_clarification(input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    loop {
        write!(output, "{} ", style("Enter your prompt:").bold())?;
        output.flush()?;

        let line = read_line(input, "reprompt")?;
        let line = line.trim();
        if !line.is_empty() {
            return Ok(line.to_string());
        }
    }
}

fn read_line(input: &mut impl BufRead, operation: &str) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(AssistError::Cancelled(format!("{} (end of input)", operation)));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn decide(input: &str, allow_reprompt: bool) -> (Result<OperatorDecision>, String) {
        console::set_colors_enabled(false);
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut written = Vec::new();
        let result = prompt_decision(&mut reader, &mut written, allow_reprompt);
        (result, String::from_utf8(written).unwrap())
    }

    #[test]
    fn test_apply_by_number() {
        let (result, output) = decide("1\n", true);
        assert_eq!(result.unwrap(), OperatorDecision::Apply);
        assert!(output.contains("1) Apply"));
        assert!(output.contains("2) Don't Apply"));
        assert!(output.contains("3) Reprompt"));
    }

    #[test]
    fn test_reprompt_reads_clarification() {
        let (result, _) = decide("reprompt\n\nuse nginx:1.25\n", true);
        assert_eq!(
            result.unwrap(),
            OperatorDecision::Reprompt {
                clarification: "use nginx:1.25".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_then_valid() {
        let (result, output) = decide("maybe\nDon't Apply\n", true);
        assert_eq!(result.unwrap(), OperatorDecision::Decline);
        assert!(output.contains("'maybe' is not one of the choices"));
    }

    #[test]
    fn test_withdrawn_menu() {
        let (result, output) = decide("2\n", false);
        assert_eq!(result.unwrap(), OperatorDecision::Decline);
        assert!(!output.contains("Reprompt"));
    }

    #[test]
    fn test_withdrawn_reprompt_asks_again() {
        let (result, output) = decide("r\nmake it 3 replicas\n1\n", false);
        assert_eq!(result.unwrap(), OperatorDecision::Apply);
        assert!(output.contains("'r' is not one of the choices"));
        assert!(output.contains("'make it 3 replicas' is not one of the choices"));
        assert!(!output.contains("Enter your prompt:"));
    }

    #[test]
    fn test_end_of_input() {
        let (result, _) = decide("", true);
        assert_matches!(result, Err(AssistError::Cancelled(_)));
    }
}
