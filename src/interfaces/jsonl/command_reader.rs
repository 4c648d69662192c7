use crate::domain::application::{ApplicationId, Submission};
use crate::domain::disbursement::{DestinationDetails, DisbursementMethod};
use crate::domain::fee::FeeSchedule;
use crate::domain::money::Amount;
use crate::domain::payment::{CryptoCurrency, PaymentId, PaymentMethod, PaymentProvider};
use crate::error::{LendingError, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};

/// One lifecycle command per JSON line, discriminated by `op`.
///
/// The payloads are heterogeneous (a full submission next to a two-field
/// annotation), which is why the input side is JSONL while the report stays
/// CSV.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Submit {
        submission: Submission,
    },
    StartReview {
        application: ApplicationId,
        reviewer: String,
    },
    Approve {
        application: ApplicationId,
        amount: Amount,
        #[serde(default)]
        notes: Option<String>,
    },
    Reject {
        application: ApplicationId,
        reason: String,
    },
    Cancel {
        application: ApplicationId,
    },
    SetFeeSchedule {
        schedule: FeeSchedule,
    },
    BeginPayment {
        application: ApplicationId,
        method: PaymentMethod,
        #[serde(default)]
        provider: Option<PaymentProvider>,
        #[serde(default)]
        card_token: Option<String>,
        #[serde(default)]
        crypto_currency: Option<CryptoCurrency>,
    },
    ConfirmPayment {
        payment: PaymentId,
    },
    Webhook {
        provider: PaymentProvider,
        body: String,
        signature: String,
    },
    Disburse {
        application: ApplicationId,
        method: DisbursementMethod,
        #[serde(default)]
        destination: DestinationDetails,
        #[serde(default)]
        notes: Option<String>,
    },
    AnnotateFraudLog {
        log: u64,
        reviewer: String,
        note: String,
    },
}

/// Reads lifecycle commands from a JSONL source.
///
/// Wraps any `Read` in a `BufReader` and yields `Result<Command>` per line,
/// so large command streams are processed without loading the whole file.
pub struct CommandReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    ///
    /// Blank lines are skipped; a malformed line yields an `Err` item
    /// without ending the stream.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.lines().filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(serde_json::from_str(&line).map_err(LendingError::from)),
            Err(err) => Some(Err(LendingError::from(err))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_valid_stream() {
        let data = concat!(
            r#"{"op":"start_review","application":1,"reviewer":"lmartin"}"#,
            "\n",
            r#"{"op":"approve","application":1,"amount":2400000}"#,
            "\n",
        );
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(commands.len(), 2);
        match commands[0].as_ref().unwrap() {
            Command::StartReview {
                application,
                reviewer,
            } => {
                assert_eq!(*application, ApplicationId(1));
                assert_eq!(reviewer, "lmartin");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        match commands[1].as_ref().unwrap() {
            Command::Approve { amount, notes, .. } => {
                assert_eq!(*amount, Amount::new(2_400_000).unwrap());
                assert!(notes.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let data = "\n\n{\"op\":\"cancel\",\"application\":3}\n   \n";
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(commands.len(), 1);
        assert!(matches!(
            commands[0].as_ref().unwrap(),
            Command::Cancel {
                application: ApplicationId(3)
            }
        ));
    }

    #[test]
    fn malformed_line_errors_without_ending_the_stream() {
        let data = concat!(
            r#"{"op":"cancel","application":1}"#,
            "\n",
            "{not json}\n",
            r#"{"op":"cancel","application":2}"#,
            "\n",
        );
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(commands.len(), 3);
        assert!(commands[0].is_ok());
        assert!(commands[1].is_err());
        assert!(commands[2].is_ok());
    }

    #[test]
    fn unknown_op_is_an_error() {
        let data = r#"{"op":"escalate","application":1}"#;
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();
        assert!(commands[0].is_err());
    }

    #[test]
    fn non_positive_amounts_are_rejected_at_parse_time() {
        let data = r#"{"op":"approve","application":1,"amount":-5}"#;
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();
        assert!(commands[0].is_err());
    }

    #[test]
    fn fee_schedule_payloads_parse_both_modes() {
        let data = concat!(
            r#"{"op":"set_fee_schedule","schedule":{"mode":"percentage","rate_bps":225}}"#,
            "\n",
            r#"{"op":"set_fee_schedule","schedule":{"mode":"fixed","amount":57500}}"#,
            "\n",
        );
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();

        assert!(matches!(
            commands[0].as_ref().unwrap(),
            Command::SetFeeSchedule {
                schedule: FeeSchedule::Percentage { rate_bps: 225 }
            }
        ));
        assert!(matches!(
            commands[1].as_ref().unwrap(),
            Command::SetFeeSchedule {
                schedule: FeeSchedule::Fixed { .. }
            }
        ));
    }

    #[test]
    fn disburse_destination_defaults_to_empty() {
        let data = r#"{"op":"disburse","application":1,"method":"paycard"}"#;
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();
        match commands[0].as_ref().unwrap() {
            Command::Disburse {
                method,
                destination,
                ..
            } => {
                assert_eq!(*method, DisbursementMethod::Paycard);
                assert_eq!(*destination, DestinationDetails::default());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
