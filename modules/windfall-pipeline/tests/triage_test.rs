//! Headline triage: batch failure degradation and watchlist boosting.

mod harness;

use harness::TestContext;
use std::sync::atomic::Ordering;
use windfall_common::types::{EntityKind, Stage, WatchlistEntity};
use windfall_pipeline::testing::article;

#[tokio::test]
async fn failed_batches_degrade_to_per_item_classification() {
    let ctx = TestContext::new();
    let titles = [
        "Family office buys out co-founder",
        "Rain expected across the plateau",
        "Succession battle at packaging group",
    ];
    for (i, title) in titles.iter().enumerate() {
        ctx.store
            .seed_article(&article(title, &format!("https://news.ch/{i}"), "nzz", "CH"));
    }
    ctx.headlines.script_score(titles[0], 80);
    ctx.headlines.script_score(titles[1], 5);
    ctx.headlines.script_score(titles[2], 65);
    // Both batch attempts fail, the third headline also fails per-item.
    ctx.headlines.fail_next_batches(2);
    ctx.headlines.fail_single_for(titles[2]);

    let report = ctx.run_default().await;
    assert!(report.success);

    let funnel = &report.audit.funnel;
    assert!(funnel.is_consistent());
    // Two headlines got verdicts via fallback, the failed one got none.
    assert_eq!(funnel.headlines_assessed, 2);
    assert_eq!(funnel.relevant_headlines, 1);
    assert_eq!(ctx.headlines.batch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.headlines.single_calls.load(Ordering::SeqCst), 3);

    // The unclassifiable headline is dropped with a failure trail entry.
    let failed = ctx
        .store
        .articles()
        .into_iter()
        .find(|a| a.title == titles[2])
        .unwrap();
    assert!(failed
        .trail
        .iter()
        .any(|t| t.stage == Stage::Triage && t.status == "failed"));
}

#[tokio::test]
async fn watchlist_hit_boosts_score_over_the_threshold() {
    let ctx = TestContext::new();
    ctx.store.seed_watchlist(WatchlistEntity {
        name: "Marta Voss".to_string(),
        kind: EntityKind::Individual,
        terms: vec!["Voss".to_string()],
        country: None,
        hit_count: 0,
    });

    let boosted_title = "Voss steps back from day-to-day business";
    let plain_title = "Founder steps back from day-to-day business";
    ctx.store
        .seed_article(&article(boosted_title, "https://news.ch/a", "nzz", "CH"));
    ctx.store
        .seed_article(&article(plain_title, "https://news.ch/b", "nzz", "CH"));
    // Raw score 30 is below the threshold of 40; the +15 boost carries the
    // watchlist headline over it.
    ctx.headlines.script_score(boosted_title, 30);
    ctx.headlines.script_score(plain_title, 30);

    let report = ctx.run_default().await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.relevant_headlines, 1);

    let boosted = ctx
        .store
        .articles()
        .into_iter()
        .find(|a| a.title == boosted_title)
        .unwrap();
    assert_eq!(boosted.headline_score, Some(45));

    // The hit is recorded on the entity.
    let entity = &ctx.store.watchlist()[0];
    assert_eq!(entity.hit_count, 1);
}

#[tokio::test]
async fn boosted_score_is_capped_at_one_hundred() {
    let ctx = TestContext::new();
    ctx.store.seed_watchlist(WatchlistEntity {
        name: "Atlas Capital".to_string(),
        kind: EntityKind::Company,
        terms: vec![],
        country: None,
        hit_count: 0,
    });
    let title = "Atlas Capital founder sells entire stake";
    ctx.store
        .seed_article(&article(title, "https://news.ch/atlas", "nzz", "CH"));
    ctx.headlines.script_score(title, 95);

    let report = ctx.run_default().await;
    assert!(report.success);
    let a = &ctx.store.articles()[0];
    assert_eq!(a.headline_score, Some(100));
}
