//! Per-source analytics rollup and failing-source flagging across runs.

mod harness;

use harness::TestContext;
use windfall_pipeline::testing::{article, assessment};

#[tokio::test]
async fn repeated_scrape_failures_flag_the_source() {
    let ctx = TestContext::new();

    for run in 0..3u32 {
        let title = format!("Deal rumor number {run}");
        let link = format!("https://brokenpaper.ch/{run}");
        // Relevant headline, but the page never scrapes.
        ctx.store.seed_article(&article(&title, &link, "brokenpaper", "CH"));
        ctx.headlines.script_score(&title, 60);

        let report = ctx.run_default().await;
        assert!(report.success);

        let source = ctx.store.source("brokenpaper").unwrap();
        // Auto-created source documents carry the site origin as their URL.
        assert_eq!(source.url, "https://brokenpaper.ch");
        assert_eq!(source.analytics.runs, run + 1);
        assert_eq!(source.analytics.consecutive_scrape_failures, run + 1);

        if run < 2 {
            assert!(report.audit.failing_sources.is_empty());
        } else {
            assert_eq!(report.audit.failing_sources, vec!["brokenpaper".to_string()]);
        }
    }
}

#[tokio::test]
async fn successful_run_resets_the_failure_streak() {
    let ctx = TestContext::new();

    // Two failing runs.
    for run in 0..2 {
        let title = format!("Rumor {run}");
        ctx.store.seed_article(&article(
            &title,
            &format!("https://paper.ch/{run}"),
            "paper",
            "CH",
        ));
        ctx.headlines.script_score(&title, 60);
        ctx.run_default().await;
    }
    assert_eq!(
        ctx.store.source("paper").unwrap().analytics.consecutive_scrape_failures,
        2
    );

    // A run where the source's article scrapes fine.
    let title = "Confirmed sale with details";
    let link = "https://paper.ch/confirmed";
    ctx.store.seed_article(&article(title, link, "paper", "CH"));
    ctx.headlines.script_score(title, 70);
    ctx.fetcher.script_page(link, "confirmed-body text");
    ctx.assessor
        .script_assessment("confirmed-body", assessment(65, "A real sale"));

    let report = ctx.run_default().await;
    assert!(report.success);

    let analytics = ctx.store.source("paper").unwrap().analytics;
    assert_eq!(analytics.consecutive_scrape_failures, 0);
    assert_eq!(analytics.runs, 3);
    assert_eq!(analytics.relevant_found, 1);
    assert!(report.audit.failing_sources.is_empty());
}

#[tokio::test]
async fn funnel_stays_monotone_through_a_mixed_run() {
    let ctx = TestContext::new();
    let cases: [(&str, i64); 4] = [
        ("Founder exits with nine figures", 85),
        ("Weather warning for the weekend", 5),
        ("Heir takes over industrial group", 55),
        ("Stadium renovation approved", 12),
    ];
    for (i, (title, score)) in cases.iter().enumerate() {
        let link = format!("https://mixed.ch/{i}");
        ctx.store.seed_article(&article(title, &link, "mixed", "CH"));
        ctx.headlines.script_score(title, *score);
        ctx.fetcher.script_page(&link, &format!("mixed-{i} body"));
        ctx.assessor
            .script_assessment(&format!("mixed-{i}"), assessment(*score, "summary"));
    }

    let report = ctx.run_default().await;
    assert!(report.success);

    let funnel = &report.audit.funnel;
    assert!(funnel.is_consistent());
    assert_eq!(funnel.headlines_scraped, 4);
    assert_eq!(funnel.headlines_assessed, 4);
    assert_eq!(funnel.relevant_headlines, 2);
    assert_eq!(funnel.articles_enriched, 2);
    // Everything that entered enrichment is accounted for.
    assert_eq!(funnel.articles_enriched + funnel.articles_dropped, 2);
}
