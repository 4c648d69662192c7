use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::File;
use std::io::Write;
use std::process::Command;

fn submit_line(user_id: u64, tax_identifier: &str, requested: i64) -> String {
    serde_json::json!({
        "op": "submit",
        "submission": {
            "user_id": user_id,
            "applicant": {
                "full_name": "Dana Whitfield",
                "date_of_birth": "1988-04-12",
                "tax_identifier": tax_identifier,
                "government_id": "D1234567",
                "email": format!("applicant{user_id}@example.com"),
                "phone": "555-867-5309",
                "street_address": "41 Birch Lane",
                "city": "Spokane",
                "state": "WA",
                "postal_code": "99201"
            },
            "employment": {
                "employer": "Inland Tooling",
                "status": "employed",
                "annual_income": requested * 4,
                "months_employed": 48
            },
            "loan_type": "personal",
            "requested_amount": requested,
            "purpose": "Replace the failed heat pump before winter",
            "consents": {
                "terms_of_service": true,
                "privacy_policy": true,
                "credit_check": true,
                "loan_agreement": true,
                "electronic_signature": true
            }
        }
    })
    .to_string()
}

#[test]
fn test_requested_amount_bounds() {
    let output_path = std::path::PathBuf::from("boundary_test.jsonl");
    let mut file = File::create(&output_path).unwrap();

    // One below the minimum, both ends of the range, one above the maximum
    writeln!(file, "{}", submit_line(1, "301-21-0001", 49_999)).unwrap();
    writeln!(file, "{}", submit_line(2, "301-21-0002", 50_000)).unwrap();
    writeln!(file, "{}", submit_line(3, "301-21-0003", 10_000_000)).unwrap();
    writeln!(file, "{}", submit_line(4, "301-21-0004", 10_000_001)).unwrap();
    file.flush().unwrap();
    drop(file);

    let mut cmd = Command::new(cargo_bin!("loanport"));
    cmd.arg(&output_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error applying command"))
        .stdout(predicate::str::contains(
            "application,status,requested_amount,approved_amount,processing_fee,disbursement_reference,estimated_delivery",
        ))
        .stdout(predicate::str::contains("1,pending,50000,,,,"))
        .stdout(predicate::str::contains("2,pending,10000000,,,,"))
        .stdout(predicate::str::contains("\n3,").not());

    std::fs::remove_file(output_path).ok();
}

#[test]
fn test_fee_rate_bounds() {
    let output_path = std::path::PathBuf::from("fee_boundary_test.jsonl");
    let mut file = File::create(&output_path).unwrap();

    // 149 bps is out of range and must not displace the default schedule
    writeln!(
        file,
        r#"{{"op":"set_fee_schedule","schedule":{{"mode":"percentage","rate_bps":149}}}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op":"set_fee_schedule","schedule":{{"mode":"percentage","rate_bps":150}}}}"#
    )
    .unwrap();
    writeln!(file, "{}", submit_line(5, "301-21-0005", 2_500_000)).unwrap();
    writeln!(file, r#"{{"op":"approve","application":1,"amount":1000000}}"#).unwrap();
    file.flush().unwrap();
    drop(file);

    let mut cmd = Command::new(cargo_bin!("loanport"));
    cmd.arg(&output_path);

    // 150 bps of 1,000,000 minor units
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error applying command"))
        .stdout(predicate::str::contains("1,approved,2500000,1000000,15000,,"));

    std::fs::remove_file(output_path).ok();
}
