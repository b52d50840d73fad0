//! Quality-gate behavior: explicit rejections remove candidates before
//! commit, and a failed review keeps everything (fail-open).

mod harness;

use harness::TestContext;
use windfall_pipeline::llm::{QualityLabel, ReviewVerdict};
use windfall_pipeline::testing::{article, assessment, candidate_event, candidate_opportunity};

const EVENT_KEY: &str = "generic-stake-sale";

fn wire_event(ctx: &TestContext) {
    let title = "Minor stake changes hands";
    let link = "https://news.ch/stake";
    ctx.store.seed_article(&article(title, link, "nzz", "CH"));
    ctx.headlines.script_score(title, 70);
    ctx.fetcher.script_page(link, "stake-body text");
    ctx.assessor
        .script_assessment("stake-body", assessment(72, "A stake was sold"));
    ctx.composer.script_cluster(EVENT_KEY, vec![link.to_string()]);
    ctx.composer.script_events(
        EVENT_KEY,
        vec![candidate_event(
            "Stake sold in regional firm",
            "An unnamed holder sold a stake.",
            "stake_sale",
        )],
    );
}

fn wire_dossier(ctx: &TestContext) {
    ctx.composer.script_opportunities(
        "Stake sold in regional firm",
        vec![candidate_opportunity(
            "Remo Gasser",
            "Sold his minority stake",
            120.0,
        )],
    );
}

#[tokio::test]
async fn rejected_event_is_not_committed() {
    let ctx = TestContext::new();
    wire_event(&ctx);
    ctx.judge.script_verdict(ReviewVerdict {
        id: format!("event_{EVENT_KEY}"),
        label: QualityLabel::Poor,
    });

    let report = ctx.run_default().await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.judge_rejected, 1);
    assert_eq!(report.audit.funnel.events_committed, 0);
    assert!(ctx.store.event(EVENT_KEY).is_none());
    assert_eq!(ctx.notifier.count(), 0);
    assert!(report.audit.judge_verdict.contains("1 rejected"));
}

#[tokio::test]
async fn passing_verdicts_keep_candidates() {
    let ctx = TestContext::new();
    wire_event(&ctx);
    ctx.judge.script_verdict(ReviewVerdict {
        id: format!("event_{EVENT_KEY}"),
        label: QualityLabel::Good,
    });

    let report = ctx.run_default().await;
    assert!(report.success);
    assert_eq!(report.audit.funnel.judge_rejected, 0);
    assert!(ctx.store.event(EVENT_KEY).is_some());
}

#[tokio::test]
async fn judge_failure_fails_open() {
    let ctx = TestContext::new();
    wire_event(&ctx);
    ctx.judge.fail();

    let report = ctx.run_default().await;
    assert!(report.success);
    // Nothing is filtered when the gate itself is down.
    assert_eq!(report.audit.funnel.judge_rejected, 0);
    assert!(ctx.store.event(EVENT_KEY).is_some());
    assert!(report.audit.judge_verdict.contains("fail-open"));
}

#[tokio::test]
async fn rejected_dossier_is_unlinked_from_surviving_event() {
    let ctx = TestContext::new();
    wire_event(&ctx);
    wire_dossier(&ctx);
    ctx.judge.script_verdict(ReviewVerdict {
        id: "opportunity_Remo Gasser".to_string(),
        label: QualityLabel::Irrelevant,
    });

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);
    assert!(ctx.store.opportunity("Remo Gasser").is_none());
    // The surviving event does not keep a reference to the rejected
    // dossier; a union merge would never let go of one.
    let event = ctx.store.event(EVENT_KEY).expect("event committed");
    assert!(event.opportunity_names.is_empty());
}

#[tokio::test]
async fn rejected_event_is_unlinked_from_surviving_dossier() {
    let ctx = TestContext::new();
    wire_event(&ctx);
    wire_dossier(&ctx);
    ctx.judge.script_verdict(ReviewVerdict {
        id: format!("event_{EVENT_KEY}"),
        label: QualityLabel::Poor,
    });

    let report = ctx.run_default().await;
    assert!(report.success, "errors: {:?}", report.audit.errors);
    assert!(ctx.store.event(EVENT_KEY).is_none());
    let dossier = ctx.store.opportunity("Remo Gasser").expect("dossier committed");
    assert!(dossier.event_keys.is_empty());
}

#[tokio::test]
async fn unmentioned_items_are_kept() {
    let ctx = TestContext::new();
    wire_event(&ctx);
    // The judge answers, but says nothing about this event.
    let report = ctx.run_default().await;
    assert!(report.success);
    assert!(ctx.store.event(EVENT_KEY).is_some());
    assert!(report.audit.judge_verdict.contains("0 rejected"));
}
