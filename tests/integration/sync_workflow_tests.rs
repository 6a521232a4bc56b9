/*!
 * End-to-end synchronization scenarios against the mock provider
 */

use std::sync::Arc;
use std::time::Duration;

use storyforge::content::{Block, BlockKind, Page};
use storyforge::providers::mock::MockProvider;
use storyforge::translation::{fingerprint, BlockState, TranslationOrchestrator};

use crate::common::{english_store, init_logging, orchestrator_with, text_pages, PeakProvider};

#[tokio::test]
async fn test_synchronize_onceUponATime_shouldTranslateAndCache() {
    init_logging();
    let provider = MockProvider::working();
    let orchestrator = orchestrator_with(text_pages(&[&["Once upon a time."]]), &["French"], provider.clone());

    assert_eq!(orchestrator.text_at("French", 0, 0).unwrap(), "");
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Stale));

    let report = orchestrator.synchronize("English", &["French"]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.applied, 1);
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Applied));
    assert_eq!(
        orchestrator.text_at("French", 0, 0).unwrap(),
        MockProvider::expected_translation("Once upon a time.", "French")
    );
    assert!(orchestrator.cache().contains(&fingerprint("Once upon a time."), "French"));
}

#[tokio::test]
async fn test_synchronize_afterEdit_shouldOnlyUpdateOnceMarkedDirty() {
    let orchestrator = orchestrator_with(text_pages(&[&["Once upon a time."]]), &["French"], MockProvider::working());
    orchestrator.synchronize("English", &["French"]).await.unwrap();
    let old = orchestrator.text_at("French", 0, 0).unwrap();

    orchestrator
        .replace_page_content("English", 0, Page::new(vec![Block::text("Once upon a time, far away.")]))
        .unwrap();
    assert_eq!(orchestrator.text_at("French", 0, 0).unwrap(), old);

    orchestrator.synchronize("English", &["French"]).await.unwrap();
    assert_eq!(orchestrator.text_at("French", 0, 0).unwrap(), old);

    let flagged = orchestrator.mark_dirty(0, 0).unwrap();
    assert_eq!(flagged, vec!["French".to_string()]);
    orchestrator.synchronize("English", &["French"]).await.unwrap();

    assert_eq!(
        orchestrator.text_at("French", 0, 0).unwrap(),
        MockProvider::expected_translation("Once upon a time, far away.", "French")
    );
    assert_eq!(orchestrator.cache().len(), 2);
}

#[tokio::test]
async fn test_synchronize_twice_shouldMakeNoSecondCalls() {
    let provider = MockProvider::working();
    let orchestrator = orchestrator_with(
        text_pages(&[&["One.", "Two."], &["Three."]]),
        &["French", "German"],
        provider.clone(),
    );

    let first = orchestrator.synchronize("English", &[] as &[&str]).await.unwrap();
    let calls_after_first = provider.calls();
    let second = orchestrator.synchronize("English", &[] as &[&str]).await.unwrap();

    assert_eq!(first.applied, 6);
    assert_eq!(second.total_units, 0);
    assert_eq!(second.translation_calls, 0);
    assert_eq!(provider.calls(), calls_after_first);
}

#[tokio::test]
async fn test_synchronize_withDuplicateTexts_shouldCallOncePerLanguage() {
    let provider = MockProvider::working();
    let orchestrator = orchestrator_with(
        text_pages(&[&["The end.", "The end."], &["The end."]]),
        &["French", "German"],
        provider.clone(),
    );

    let report = orchestrator.synchronize("English", &["French", "German"]).await.unwrap();

    assert_eq!(report.applied, 6);
    assert_eq!(provider.calls(), 2);
    assert_eq!(report.translation_calls, 2);
}

#[tokio::test]
async fn test_synchronize_withOneFailingBlock_shouldContainFailure() {
    let provider = MockProvider::working().failing_on(["Broken."]);
    let orchestrator = orchestrator_with(
        text_pages(&[&["Fine.", "Broken."], &["Also fine."]]),
        &["French"],
        provider,
    );

    let report = orchestrator.synchronize("English", &["French"]).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key.block, 1);
    assert_eq!(orchestrator.block_state("French", 0, 1), Some(BlockState::Stale));
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Applied));
    assert_eq!(orchestrator.block_state("French", 1, 0), Some(BlockState::Applied));
    assert_eq!(orchestrator.text_at("French", 0, 1).unwrap(), "");

    let counts = orchestrator.state_counts();
    assert_eq!(counts.get(&BlockState::Stale), Some(&1));
    assert_eq!(counts.get(&BlockState::Applied), Some(&2));
}

#[tokio::test]
async fn test_synchronize_withConcurrentRuns_shouldShareRequestCeiling() {
    let texts: Vec<String> = (0..20).map(|i| format!("Line {}.", i)).collect();
    let page: Vec<&str> = texts.iter().map(String::as_str).collect();
    let provider = Arc::new(PeakProvider::with_delay(20));
    let orchestrator = TranslationOrchestrator::new(english_store(text_pages(&[page.as_slice()])), provider.clone())
        .with_max_concurrent_requests(3);
    orchestrator.add_language("French").unwrap();
    orchestrator.add_language("German").unwrap();

    let (french, german) = tokio::join!(
        orchestrator.synchronize("English", &["French"]),
        orchestrator.synchronize("English", &["German"]),
    );

    assert_eq!(french.unwrap().applied, 20);
    assert_eq!(german.unwrap().applied, 20);
    assert_eq!(provider.calls(), 40);
    assert!(provider.peak() <= 3, "peak in-flight was {}", provider.peak());
    assert!(provider.peak() >= 2);
}

#[tokio::test]
async fn test_removePage_duringRun_shouldDiscardLateResults() {
    let orchestrator = orchestrator_with(text_pages(&[&["A"], &["B"]]), &["French"], MockProvider::slow(300));

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.synchronize("English", &["French"]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orchestrator.pending_count(), 2);

    orchestrator.remove_page(0).unwrap();
    let report = running.await.unwrap().unwrap();

    assert_eq!(report.discarded, 2);
    assert_eq!(report.applied, 0);
    assert_eq!(orchestrator.pending_count(), 0);
    assert_eq!(orchestrator.text_at("French", 0, 0).unwrap(), "");
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Stale));

    orchestrator.synchronize("English", &["French"]).await.unwrap();
    assert_eq!(orchestrator.text_at("French", 0, 0).unwrap(), "[French] B");
}

#[tokio::test]
async fn test_progress_duringRun_shouldNeverDecrease() {
    let orchestrator = orchestrator_with(
        text_pages(&[&["One.", "Two."], &["Three.", "Four."]]),
        &["French"],
        MockProvider::slow(60),
    )
    .with_max_concurrent_requests(1);

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.synchronize("English", &["French"]).await })
    };
    while orchestrator.pending_count() == 0 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut samples = Vec::new();
    while !running.is_finished() {
        samples.push(orchestrator.progress());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let report = running.await.unwrap().unwrap();
    samples.push(orchestrator.progress());

    assert_eq!(report.applied, 4);
    assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]), "progress went backwards: {:?}", samples);
    assert!(samples[0] < 1.0);
    assert_eq!(samples.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_cancelLanguage_duringRun_shouldReleasePendingUnits() {
    let orchestrator = orchestrator_with(
        text_pages(&[&["Slow one.", "Slow two."]]),
        &["French", "German"],
        MockProvider::slow(500),
    );

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.synchronize("English", &[] as &[&str]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orchestrator.pending_count() > 0);

    let released = orchestrator.cancel_language("French").unwrap();
    let report = running.await.unwrap().unwrap();

    assert_eq!(released, 2);
    assert!(report.cancelled >= 2);
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Stale));
    assert_eq!(orchestrator.block_state("German", 0, 0), Some(BlockState::Applied));
    assert_eq!(orchestrator.pending_count(), 0);
}

#[tokio::test]
async fn test_synchronize_whenDropped_shouldLeaveNothingPending() {
    let orchestrator = orchestrator_with(text_pages(&[&["Never finishes."]]), &["French"], MockProvider::slow(5_000));

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.synchronize("English", &["French"]),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(orchestrator.pending_count(), 0);
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Stale));
}

#[tokio::test]
async fn test_markDirty_shouldOnlyFlagEditedBlockInEveryLanguage() {
    let orchestrator = orchestrator_with(
        text_pages(&[&["First.", "Second."]]),
        &["French", "German"],
        MockProvider::working(),
    );
    orchestrator.synchronize("English", &[] as &[&str]).await.unwrap();

    orchestrator
        .replace_page_content(
            "English",
            0,
            Page::new(vec![Block::text("First, edited."), Block::text("Second.")]),
        )
        .unwrap();
    let mut flagged = orchestrator.mark_dirty(0, 0).unwrap();
    flagged.sort();

    assert_eq!(flagged, vec!["French".to_string(), "German".to_string()]);
    assert_eq!(orchestrator.block_state("French", 0, 0), Some(BlockState::Stale));
    assert_eq!(orchestrator.block_state("German", 0, 0), Some(BlockState::Stale));
    assert_ne!(orchestrator.block_state("French", 0, 1), Some(BlockState::Stale));
    assert_ne!(orchestrator.block_state("German", 0, 1), Some(BlockState::Stale));
}

#[tokio::test]
async fn test_addLanguage_afterSync_shouldMirrorShapeWithEmptyText() {
    let orchestrator = orchestrator_with(crate::common::illustrated_pages(), &["French"], MockProvider::working());
    orchestrator.synchronize("English", &["French"]).await.unwrap();

    orchestrator.add_language("Spanish").unwrap();

    let english = orchestrator.snapshot("English").unwrap();
    let spanish = orchestrator.snapshot("Spanish").unwrap();
    assert_eq!(english.len(), spanish.len());
    for (source, derived) in english.iter().zip(spanish.iter()) {
        assert_eq!(source.shape(), derived.shape());
        assert!(derived.texts().all(str::is_empty));
    }
    assert_eq!(spanish[0].blocks[1].kind(), BlockKind::Image);
}

#[tokio::test]
async fn test_removeLanguage_shouldDropItsCacheEntries() {
    let orchestrator = orchestrator_with(text_pages(&[&["Hello."]]), &["French", "German"], MockProvider::working());
    orchestrator.synchronize("English", &[] as &[&str]).await.unwrap();
    assert_eq!(orchestrator.cache().len(), 2);

    orchestrator.remove_language("German").unwrap();

    assert_eq!(orchestrator.cache().len(), 1);
    assert!(!orchestrator.languages().contains(&"German".to_string()));
    assert!(orchestrator.synchronize("English", &["German"]).await.is_err());
}
