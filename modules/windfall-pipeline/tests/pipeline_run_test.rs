//! Full-run scenario: three articles covering the same acquisition become
//! one event with one opportunity, and a repeat run converges instead of
//! duplicating or re-notifying.

mod harness;

use harness::TestContext;
use windfall_pipeline::pipeline::RunOptions;
use windfall_pipeline::testing::{
    article, assessment, candidate_event, candidate_opportunity,
};

const EVENT_KEY: &str = "helvetia-robotics-acquisition";

fn wire_acquisition_scenario(ctx: &TestContext) {
    let links = [
        "https://news.ch/helvetia-1",
        "https://news.ch/helvetia-2",
        "https://news.ch/helvetia-3",
    ];
    let titles = [
        "Helvetia Robotics sold to US group",
        "Founders cash out in Helvetia deal",
        "Zurich robotics firm changes hands",
    ];

    for (i, (link, title)) in links.iter().zip(&titles).enumerate() {
        ctx.store.seed_article(&article(title, link, "nzz", "CH"));
        ctx.headlines.script_score(title, 70 - (i as i64) * 5);
        ctx.fetcher.script_page(link, &format!("body-{i} full article text"));
        ctx.assessor.script_assessment(
            &format!("body-{i}"),
            assessment(80 - (i as i64) * 5, &format!("Summary {i}")),
        );
    }

    ctx.composer.script_cluster(
        EVENT_KEY,
        links.iter().map(|l| l.to_string()).collect(),
    );
    ctx.composer.script_events(
        EVENT_KEY,
        vec![candidate_event(
            "Helvetia Robotics acquired by US group",
            "The founding family sells its robotics firm.",
            "acquisition",
        )],
    );
    ctx.composer.script_opportunities(
        "Helvetia Robotics acquired by US group",
        vec![candidate_opportunity(
            "Marta Voss",
            "Sold Helvetia Robotics for a reported 200M",
            150.0,
        )],
    );
}

#[tokio::test]
async fn clustered_articles_become_one_event_with_opportunity() {
    let ctx = TestContext::new();
    wire_acquisition_scenario(&ctx);

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);

    let funnel = &report.audit.funnel;
    assert!(funnel.is_consistent());
    assert_eq!(funnel.headlines_scraped, 3);
    assert_eq!(funnel.fresh_headlines, 3);
    assert_eq!(funnel.headlines_assessed, 3);
    assert_eq!(funnel.relevant_headlines, 3);
    assert_eq!(funnel.articles_enriched, 3);
    assert_eq!(funnel.events_synthesized, 1);
    assert_eq!(funnel.events_committed, 1);
    assert_eq!(funnel.opportunities_created, 1);

    let event = ctx.store.event(EVENT_KEY).expect("event committed");
    assert_eq!(event.classification, "acquisition");
    assert_eq!(event.source_links.len(), 3);
    // Cluster max content score feeds the event score.
    assert_eq!(event.highest_relevance_score, 80);
    assert_eq!(event.opportunity_names, vec!["Marta Voss".to_string()]);

    let opportunity = ctx.store.opportunity("Marta Voss").expect("dossier created");
    assert_eq!(opportunity.wealth_estimate_musd, 150.0);
    assert!(opportunity.event_keys.contains(&EVENT_KEY.to_string()));
    assert!(!opportunity.embedding.is_empty());

    // One notification carrying the new event and the new dossier.
    assert_eq!(ctx.notifier.count(), 1);
    let audits = ctx.store.audits();
    assert_eq!(audits.len(), 1);
    assert!(audits[0].event_keys.contains(&EVENT_KEY.to_string()));
}

#[tokio::test]
async fn unclustered_high_scorer_is_promoted_to_its_own_event() {
    let ctx = TestContext::new();
    wire_acquisition_scenario(&ctx);

    // A fourth article the clusterer leaves out, scoring above the
    // singleton promotion threshold.
    let title = "Bernese heiress sells vineyard estate";
    let link = "https://news.ch/vineyard";
    ctx.store.seed_article(&article(title, link, "nzz", "CH"));
    ctx.headlines.script_score(title, 80);
    ctx.fetcher.script_page(link, "vineyard-body text");
    ctx.assessor
        .script_assessment("vineyard-body", assessment(78, "Estate sold"));

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);
    assert_eq!(report.audit.funnel.events_synthesized, 2);
    assert!(ctx.store.event(EVENT_KEY).is_some());
    assert!(ctx
        .store
        .event("bernese-heiress-sells-vineyard-estate")
        .is_some());
}

#[tokio::test]
async fn second_run_converges_without_re_notifying() {
    let ctx = TestContext::new();
    wire_acquisition_scenario(&ctx);

    ctx.run_default().await;
    assert_eq!(ctx.notifier.count(), 1);

    // Plain rerun: all links are now known, nothing flows downstream.
    let report = ctx.run_default().await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.fresh_headlines, 0);
    assert_eq!(ctx.store.events().len(), 1);
    assert_eq!(ctx.notifier.count(), 1);
}

#[tokio::test]
async fn rescraped_processed_links_are_skipped_without_refresh() {
    let ctx = TestContext::new();
    wire_acquisition_scenario(&ctx);
    ctx.run_default().await;

    // The scraper sees the same links again on its next pass; they were
    // already carried through a run, so nothing is fresh.
    let rescraped: Vec<_> = ctx
        .store
        .articles()
        .into_iter()
        .map(|a| article(&a.title, &a.link, &a.source, &a.country))
        .collect();
    let report = ctx
        .run(RunOptions {
            injected_articles: Some(rescraped),
            ..Default::default()
        })
        .await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.headlines_scraped, 3);
    assert_eq!(report.audit.funnel.fresh_headlines, 0);
    assert_eq!(ctx.store.events().len(), 1);
    assert_eq!(ctx.notifier.count(), 1);
}

#[tokio::test]
async fn refresh_run_reprocesses_and_updates_in_place() {
    let ctx = TestContext::new();
    wire_acquisition_scenario(&ctx);

    let first = ctx.run_default().await;
    assert_eq!(first.audit.funnel.opportunities_created, 1);

    // Refresh re-feeds the same articles through the whole pipeline.
    let articles = ctx.store.articles();
    let report = ctx
        .run(RunOptions {
            refresh: true,
            injected_articles: Some(articles),
            ..Default::default()
        })
        .await;
    assert!(report.success, "errors: {:?}", report.audit.errors);

    // The event key converges onto the same document and the dossier is
    // updated, not duplicated.
    assert_eq!(ctx.store.events().len(), 1);
    assert_eq!(report.audit.funnel.opportunities_created, 0);
    assert_eq!(report.audit.funnel.opportunities_updated, 1);
    assert_eq!(ctx.store.opportunities().len(), 1);
    // No new event keys, so no second notification.
    assert_eq!(ctx.notifier.count(), 1);
}

#[tokio::test]
async fn out_of_scope_content_is_dropped_before_full_assessment() {
    let ctx = TestContext::new();
    let title = "Lottery jackpot rolls over again";
    ctx.store
        .seed_article(&article(title, "https://news.ch/lotto", "nzz", "CH"));
    ctx.headlines.script_score(title, 55);
    ctx.fetcher
        .script_page("https://news.ch/lotto", "nobody won anything");
    ctx.assessor.script_out_of_scope(title);

    let report = ctx.run_default().await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.articles_dropped, 1);
    assert_eq!(report.audit.funnel.articles_enriched, 0);
    assert!(ctx.store.events().is_empty());
}
