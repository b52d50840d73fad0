//! Salvage behavior: failed scrapes of high-signal headlines get a bounded
//! number of alternative-source attempts; everything else drops cheaply.

mod harness;

use harness::TestContext;
use std::sync::atomic::Ordering;
use windfall_pipeline::testing::{article, assessment, search_result};

const TITLE: &str = "Reclusive billionaire sells shipping empire";
const LINK: &str = "https://news.ch/shipping";

#[tokio::test]
async fn high_signal_scrape_failure_is_salvaged_from_alternative_source() {
    let ctx = TestContext::new();
    ctx.store.seed_article(&article(TITLE, LINK, "nzz", "CH"));
    ctx.headlines.script_score(TITLE, 92);

    // The original page is not scripted, so its fetch fails. Three
    // alternatives exist but only salvage_attempts (2) may be fetched.
    ctx.fetcher.script_search(
        "billionaire",
        vec![
            search_result("weak rehash", "https://alt.example/1", ""),
            search_result("full story", "https://alt.example/2", ""),
            search_result("never fetched", "https://alt.example/3", ""),
        ],
    );
    ctx.fetcher.script_page("https://alt.example/1", "alt-1 thin syndicated blurb");
    ctx.fetcher.script_page("https://alt.example/2", "alt-2 complete coverage");
    ctx.fetcher.script_page("https://alt.example/3", "alt-3 should not be read");

    // First alternative assesses below the article threshold, second passes.
    ctx.assessor.script_assessment("alt-1", assessment(35, "thin"));
    ctx.assessor
        .script_assessment("alt-2", assessment(82, "Owner sells entire fleet"));

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);

    let funnel = &report.audit.funnel;
    assert_eq!(funnel.articles_salvaged, 1);
    assert_eq!(funnel.salvage_failed, 0);
    assert_eq!(funnel.articles_enriched, 1);

    let stored = ctx.store.articles();
    assert_eq!(stored[0].content_score, Some(82));
    assert_eq!(stored[0].content_summary.as_deref(), Some("Owner sells entire fleet"));

    // Original page plus exactly two alternatives; the third is never read.
    assert_eq!(ctx.fetcher.page_fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn salvage_gives_up_after_capped_attempts() {
    let ctx = TestContext::new();
    ctx.store.seed_article(&article(TITLE, LINK, "nzz", "CH"));
    ctx.headlines.script_score(TITLE, 92);

    ctx.fetcher.script_search(
        "billionaire",
        vec![
            search_result("weak one", "https://alt.example/1", ""),
            search_result("weak two", "https://alt.example/2", ""),
        ],
    );
    ctx.fetcher.script_page("https://alt.example/1", "alt-1 blurb");
    ctx.fetcher.script_page("https://alt.example/2", "alt-2 blurb");
    ctx.assessor.script_assessment("alt-1", assessment(20, "thin"));
    ctx.assessor.script_assessment("alt-2", assessment(30, "thin"));

    let report = ctx.run_default().await;
    assert!(report.success);

    let funnel = &report.audit.funnel;
    assert_eq!(funnel.articles_salvaged, 0);
    assert_eq!(funnel.salvage_failed, 1);
    assert_eq!(funnel.articles_dropped, 1);
    assert!(ctx.store.events().is_empty());
}

#[tokio::test]
async fn ordinary_scrape_failure_drops_without_salvage() {
    let ctx = TestContext::new();
    let title = "Mid-size firm reportedly seeking buyer";
    ctx.store
        .seed_article(&article(title, "https://news.ch/mid", "nzz", "CH"));
    // Above the triage threshold, below the high-signal threshold.
    ctx.headlines.script_score(title, 60);

    let report = ctx.run_default().await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.articles_dropped, 1);
    assert_eq!(report.audit.funnel.articles_salvaged, 0);
    assert_eq!(report.audit.funnel.salvage_failed, 0);
    // Only the original page fetch, no alternative-source search spend.
    assert_eq!(ctx.fetcher.page_fetches.load(Ordering::SeqCst), 1);
}
