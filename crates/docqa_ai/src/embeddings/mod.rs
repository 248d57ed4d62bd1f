use docqa_core::error::AppError;

pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;

    /// One provider round-trip for several inputs; output order matches `inputs`.
    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        inputs.iter().map(|input| self.embed(model, input)).collect()
    }
}

pub mod remote_embed;
