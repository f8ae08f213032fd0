use crate::support::{
    config_for, fixture, head_only, pytorch_checkpoint, random_classifier, save_renamed,
    write_pretrained, Fixture,
};
use sentiment_analyzer::loaders::read_weight_file;
use sentiment_analyzer::pipelines::sentiment_analysis_pipeline::*;
use std::path::Path;

const LABELS: [&str; 3] = ["negative", "neutral", "positive"];
const TEXTS: [&str; 4] = ["", "great movie", "the film is terrible!!", "okay"];

fn build_with(
    fx: &Fixture,
    checkpoint: &Path,
    partial: bool,
) -> anyhow::Result<SentimentAnalysisPipeline> {
    let mut builder = SentimentAnalysisPipelineBuilder::from_config(&config_for(checkpoint))?
        .local_model_dir(&fx.model_dir)
        .cpu();
    if partial {
        builder = builder.allow_partial_checkpoint();
    }
    builder.build()
}

fn results(pipeline: &SentimentAnalysisPipeline) -> anyhow::Result<Vec<SentimentResult>> {
    TEXTS
        .iter()
        .map(|text| pipeline.predict_with_score(text))
        .collect()
}

#[test]
fn checkpoint_with_extra_encoder_layer_fails_at_build() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    random_classifier(2, 3)?.save(&fx.checkpoint)?;

    let err = match build_with(&fx, &fx.checkpoint, false) {
        Ok(_) => panic!("2-layer checkpoint built into a 1-layer encoder"),
        Err(e) => e,
    };
    let message = format!("{err:#}");
    assert!(message.contains("does not use"), "{message}");
    assert!(message.contains("encoder.layer.1."), "{message}");
    Ok(())
}

#[test]
fn extra_encoder_layer_fails_even_over_pretrained_weights() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    write_pretrained(&random_classifier(1, 3)?, &fx.model_dir)?;
    random_classifier(2, 3)?.save(&fx.checkpoint)?;

    assert!(build_with(&fx, &fx.checkpoint, true).is_err());
    Ok(())
}

#[test]
fn head_only_checkpoint_fails_by_default() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    let source = random_classifier(1, 3)?;
    write_pretrained(&source, &fx.model_dir)?;
    save_renamed(&source, &fx.checkpoint, head_only)?;

    assert!(build_with(&fx, &fx.checkpoint, false).is_err());
    Ok(())
}

#[test]
fn partial_checkpoint_needs_pretrained_weights() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    save_renamed(&random_classifier(1, 3)?, &fx.checkpoint, head_only)?;

    let err = match build_with(&fx, &fx.checkpoint, true) {
        Ok(_) => panic!("partial checkpoint built without pretrained weights"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("needs pretrained weights"), "{err}");
    Ok(())
}

#[test]
fn head_only_checkpoint_runs_on_pretrained_encoder() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    let source = random_classifier(1, 3)?;
    let full = fx.model_dir.join("full.safetensors");
    source.save(&full)?;
    write_pretrained(&source, &fx.model_dir)?;
    save_renamed(&source, &fx.checkpoint, head_only)?;

    // Hub-style names: bare, gamma/beta, plus an unused `cls.*` tensor.
    let partial = build_with(&fx, &fx.checkpoint, true)?;
    let complete = build_with(&fx, &full, false)?;
    assert_eq!(results(&partial)?, results(&complete)?);
    Ok(())
}

#[test]
fn checkpoint_tensors_override_pretrained_ones() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    write_pretrained(&random_classifier(1, 3)?, &fx.model_dir)?;

    let over_pretrained = build_with(&fx, &fx.checkpoint, true)?;
    let alone = build_with(&fx, &fx.checkpoint, false)?;
    assert_eq!(results(&over_pretrained)?, results(&alone)?);
    Ok(())
}

#[test]
fn pytorch_state_dict_is_read() -> anyhow::Result<()> {
    let tensors = read_weight_file(&pytorch_checkpoint())?;

    assert_eq!(tensors.len(), 26);
    assert_eq!(tensors["out.weight"].dims(), &[3, 8]);
    assert_eq!(tensors["out.bias"].dims(), &[3]);
    assert_eq!(
        tensors["bert.encoder.layer.0.intermediate.dense.weight"].dims(),
        &[16, 8]
    );
    let position_ids: Vec<Vec<i64>> = tensors["bert.embeddings.position_ids"].to_vec2()?;
    assert_eq!(position_ids[0][..3], [0, 1, 2]);
    Ok(())
}

#[test]
fn builds_from_pytorch_state_dict() -> anyhow::Result<()> {
    let fx = fixture(3)?;
    let pipeline = build_with(&fx, &pytorch_checkpoint(), false)?;

    let first = results(&pipeline)?;
    for result in &first {
        assert!(LABELS.contains(&result.label.as_str()));
    }
    assert_eq!(results(&pipeline)?, first);
    Ok(())
}
