//! Opportunity resolution: canonical-name collapsing, alias learning, and
//! monotone dossier merges across runs.

mod harness;

use harness::TestContext;
use windfall_common::types::Opportunity;
use windfall_pipeline::testing::{
    article, assessment, candidate_event, candidate_opportunity,
};

/// Wire one article that synthesizes into one event naming one candidate.
fn wire_single_event(ctx: &TestContext, candidate_name: &str, wealth: f64) {
    let title = "Voss Holding sells logistics arm";
    let link = "https://news.ch/voss";
    ctx.store.seed_article(&article(title, link, "nzz", "CH"));
    ctx.headlines.script_score(title, 70);
    ctx.fetcher.script_page(link, "voss-body full text");
    ctx.assessor
        .script_assessment("voss-body", assessment(78, "Family sells division"));

    ctx.composer
        .script_cluster("voss-logistics-sale", vec![link.to_string()]);
    ctx.composer.script_events(
        "voss-logistics-sale",
        vec![candidate_event(
            "Voss family sells logistics arm",
            "The Voss family divests its logistics division.",
            "asset_sale",
        )],
    );
    ctx.composer.script_opportunities(
        "Voss family sells logistics arm",
        vec![candidate_opportunity(
            candidate_name,
            "Divested the logistics arm",
            wealth,
        )],
    );
}

#[tokio::test]
async fn name_variants_collapse_into_one_canonical_dossier() {
    let ctx = TestContext::new();
    wire_single_event(&ctx, "M. Voss", 120.0);
    ctx.dossiers.script_canonical("M. Voss", "Marta Voss");

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);

    // Stored under the canonical name only, and the variant is remembered
    // as an alias for future watchlist matching.
    assert!(ctx.store.opportunity("Marta Voss").is_some());
    assert!(ctx.store.opportunity("M. Voss").is_none());
    assert_eq!(
        ctx.store.recorded_aliases(),
        vec![("Marta Voss".to_string(), "M. Voss".to_string())]
    );

    let event = ctx.store.event("voss-logistics-sale").unwrap();
    assert_eq!(event.opportunity_names, vec!["Marta Voss".to_string()]);
}

#[tokio::test]
async fn wealth_estimate_never_decreases_across_runs() {
    let ctx = TestContext::new();

    // An existing dossier with a higher estimate than this run produces.
    let mut existing = Opportunity::new("Marta Voss", "Known family principal.");
    existing.wealth_estimate_musd = 200.0;
    existing.event_keys = vec!["earlier-event".to_string()];
    existing.reasons_to_contact = vec!["Earlier stake sale".to_string()];
    ctx.store.seed_opportunity(&existing);

    wire_single_event(&ctx, "Marta Voss", 150.0);

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);
    assert_eq!(report.audit.funnel.opportunities_updated, 1);
    assert_eq!(report.audit.funnel.opportunities_created, 0);

    let merged = ctx.store.opportunity("Marta Voss").unwrap();
    // 150 < 200: the estimate holds.
    assert_eq!(merged.wealth_estimate_musd, 200.0);
    // Event keys and reasons are set-unions.
    assert!(merged.event_keys.contains(&"earlier-event".to_string()));
    assert!(merged.event_keys.contains(&"voss-logistics-sale".to_string()));
    assert!(merged
        .reasons_to_contact
        .contains(&"Earlier stake sale".to_string()));
    assert!(merged
        .reasons_to_contact
        .contains(&"Divested the logistics arm".to_string()));
    // The biography was rewritten, not replaced wholesale.
    assert!(merged.biography.starts_with("Known family principal."));
}

#[tokio::test]
async fn higher_estimate_raises_the_stored_value() {
    let ctx = TestContext::new();
    let mut existing = Opportunity::new("Marta Voss", "Known family principal.");
    existing.wealth_estimate_musd = 200.0;
    ctx.store.seed_opportunity(&existing);

    wire_single_event(&ctx, "Marta Voss", 300.0);

    let report = ctx.run_default().await;
    assert!(report.success);
    let merged = ctx.store.opportunity("Marta Voss").unwrap();
    assert_eq!(merged.wealth_estimate_musd, 300.0);
}

#[tokio::test]
async fn scripted_contact_lands_on_the_dossier() {
    let ctx = TestContext::new();
    wire_single_event(&ctx, "Marta Voss", 100.0);
    ctx.fetcher.script_search(
        "Marta Voss",
        vec![windfall_pipeline::testing::search_result(
            "Voss Family Office",
            "https://voss-family.ch",
            "Contact: office@voss-family.ch",
        )],
    );
    ctx.dossiers
        .script_contact("Marta Voss", "office@voss-family.ch");

    let report = ctx.run_default().await;
    assert!(report.success);
    let opportunity = ctx.store.opportunity("Marta Voss").unwrap();
    assert_eq!(
        opportunity.contact_email.as_deref(),
        Some("office@voss-family.ch")
    );
}

#[tokio::test]
async fn dossier_composition_failure_skips_only_that_mention() {
    let ctx = TestContext::new();
    wire_single_event(&ctx, "Marta Voss", 100.0);
    ctx.dossiers.fail_compose_for("Marta Voss");

    let report = ctx.run_default().await;
    // The run itself succeeds; the failure is recorded, the event stays.
    assert!(report.success);
    assert!(report
        .audit
        .errors
        .iter()
        .any(|e| e.contains("Marta Voss")));
    assert!(ctx.store.opportunity("Marta Voss").is_none());
    assert!(ctx.store.event("voss-logistics-sale").is_some());
}
