use chrono::{Duration, NaiveDate, Utc};
use loanport::domain::application::{
    Applicant, ApplicationId, ConsentFlags, Employment, EmploymentStatus, LoanApplication,
    LoanType, Submission,
};
use loanport::domain::money::Amount;
use loanport::domain::payment::{ChargeRequest, CryptoCurrency, PaymentProvider};
use loanport::domain::ports::{ApplicationStoreRef, PaymentGatewayRef, SubmissionGuard};
use loanport::infrastructure::gateways::sandbox_gateways;
use loanport::infrastructure::in_memory::InMemoryStore;
use std::sync::Arc;

fn submission() -> Submission {
    Submission {
        user_id: 7,
        applicant: Applicant {
            full_name: "Dana Whitfield".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1988, 4, 12).unwrap(),
            tax_identifier: "123-45-6789".to_string(),
            government_id: "D1234567".to_string(),
            email: "dana@example.com".to_string(),
            phone: "555-867-5309".to_string(),
            street_address: "41 Birch Lane".to_string(),
            city: "Spokane".to_string(),
            state: "WA".to_string(),
            postal_code: "99201".to_string(),
        },
        employment: Employment {
            employer: "Inland Tooling".to_string(),
            status: EmploymentStatus::Employed,
            annual_income: Amount::new(9_500_000).unwrap(),
            months_employed: 48,
        },
        loan_type: LoanType::Personal,
        requested_amount: Amount::new(2_500_000).unwrap(),
        purpose: "Replace the failed heat pump before winter".to_string(),
        bankruptcy_disclosed: false,
        bankruptcy_date: None,
        consents: ConsentFlags::granted(),
    }
}

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let store: ApplicationStoreRef = Arc::new(InMemoryStore::new());

    // Verify Send + Sync by moving the handle into a spawned task
    let handle = tokio::spawn(async move {
        let sub = submission();
        let guard = SubmissionGuard {
            tax_identifier: sub.applicant.tax_identifier.clone(),
            user_id: sub.user_id,
            window_start: Utc::now() - Duration::hours(24),
        };
        let created = store
            .create_application(LoanApplication::from_submission(sub, Utc::now()), &guard)
            .await
            .unwrap();
        store.application(created.id).await.unwrap().unwrap()
    });

    let retrieved = handle.await.unwrap();
    assert_eq!(retrieved.id, ApplicationId(1));
    assert_eq!(retrieved.version, 1);
}

#[tokio::test]
async fn test_gateways_as_trait_objects() {
    let mut handles = Vec::new();
    for gateway in sandbox_gateways() {
        let gateway: PaymentGatewayRef = gateway;
        handles.push(tokio::spawn(async move {
            let request = ChargeRequest {
                amount: Amount::new(48_000).unwrap(),
                description: "Processing fee for application 1".to_string(),
                card_token: Some("tok_visa_4242".to_string()),
                crypto_currency: Some(CryptoCurrency::Btc),
            };
            let response = gateway.create_charge(&request).await.unwrap();
            (gateway.provider(), response.provider_reference)
        }));
    }

    let mut providers = Vec::new();
    for handle in handles {
        let (provider, reference) = handle.await.unwrap();
        assert!(!reference.is_empty());
        providers.push(provider);
    }
    assert!(providers.contains(&PaymentProvider::Cardpoint));
    assert!(providers.contains(&PaymentProvider::Payline));
    assert!(providers.contains(&PaymentProvider::Coinbridge));
}
