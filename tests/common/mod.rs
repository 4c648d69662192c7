use rand::Rng;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Error, Write};
use std::path::Path;

pub fn generate_commands(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for seq in 1..=rows as u64 {
        let requested = 60_000 + (seq as i64 % 900) * 1_000;
        writeln!(writer, "{}", submit_line(seq, requested))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn generate_large_commands(path: &Path, size_mb: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut rng = rand::thread_rng();

    let target_size = (size_mb * 1024 * 1024) as u64;
    let mut seq = 0u64;

    // Check size every 5000 rows to avoid syscall overhead
    loop {
        for _ in 0..5000 {
            seq += 1;
            let requested = rng.gen_range(600..=20_000) * 100;
            writeln!(writer, "{}", submit_line(seq, requested))?;
        }
        writer.flush()?; // Flush to ensure file size is updated
        if std::fs::metadata(path)?.len() >= target_size {
            break;
        }
    }
    Ok(())
}

/// One submission per distinct user, shaped so every row clears intake
/// validation and fraud screening regardless of how many rows precede it.
fn submit_line(seq: u64, requested: i64) -> String {
    json!({
        "op": "submit",
        "submission": {
            "user_id": seq,
            "applicant": {
                "full_name": format!("Applicant {seq}"),
                "date_of_birth": "1989-03-07",
                "tax_identifier": tax_identifier(seq),
                "government_id": format!("G{seq:07}"),
                "email": format!("applicant{seq}@example.com"),
                "phone": format!("555-201-{:04}", seq % 10_000),
                "street_address": format!("{} Alder Street", 100 + seq % 900),
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
            "purpose": "Consolidate two store cards into one fixed payment",
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

/// Unique per seq and never shaped like a flagged identifier: the serial
/// stays off 0000, the group off 00, and the area inside 100..=599.
fn tax_identifier(seq: u64) -> String {
    let serial = 1 + seq % 9_999;
    let group = 10 + (seq / 9_999) % 89;
    let area = 100 + (seq / (9_999 * 89)) % 500;
    format!("{area:03}-{group:02}-{serial:04}")
}
