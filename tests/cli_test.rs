use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/lifecycle.jsonl");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "application,status,requested_amount,approved_amount,processing_fee,disbursement_reference,estimated_delivery",
        ))
        // Application 1 runs the full lifecycle through an ACH disbursement
        .stdout(predicate::str::contains(
            "1,disbursed,2500000,2400000,48000,DSB-ACH-",
        ))
        // Application 2 is rejected in review and never accrues amounts
        .stdout(predicate::str::contains("2,rejected,1200000,,,,"));

    Ok(())
}
