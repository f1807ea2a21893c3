use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{gelu, log_softmax},
};

use crate::data::segmenter::gloss_windows;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct GlossModelConfig {
    pub feature_dim: usize,
    pub hidden:      usize,
    pub vocab_size:  usize,
    /// Gloss-window stride S; windows are 2S long over input padded by S/2.
    pub stride:      usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl GlossModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GlossModel<B> {
        GlossModel {
            fc1:     LinearConfig::new(self.feature_dim, self.hidden).init(device),
            fc2:     LinearConfig::new(self.hidden, self.hidden).init(device),
            head:    LinearConfig::new(self.hidden, self.vocab_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            stride:  self.stride,
        }
    }
}

/// Window-pooled gloss classifier.
///
/// Every gloss window of the (zero-padded) feature sequence is mean-pooled
/// and classified on its own, giving one class distribution per window.
#[derive(Module, Debug)]
pub struct GlossModel<B: Backend> {
    pub fc1:     Linear<B>,
    pub fc2:     Linear<B>,
    pub head:    Linear<B>,
    pub dropout: Dropout,
    pub stride:  usize,
}

impl<B: Backend> GlossModel<B> {
    /// features: [batch, seq_len, feature_dim] → log-probs: [windows, batch, vocab]
    ///
    /// # Panics
    /// Panics on an empty sequence.
    pub fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, dim] = features.dims();
        assert!(seq_len > 0, "cannot classify an empty sequence");

        let pad = self.stride / 2;
        let device = features.device();
        let padded = Tensor::cat(
            vec![
                Tensor::zeros([batch_size, pad, dim], &device),
                features,
                Tensor::zeros([batch_size, pad, dim], &device),
            ],
            1,
        );

        let pooled: Vec<Tensor<B, 3>> = gloss_windows(seq_len, self.stride)
            .into_iter()
            .map(|w| {
                padded
                    .clone()
                    .slice([0..batch_size, w.start..w.end, 0..dim])
                    .mean_dim(1)
            })
            .collect();
        let x = Tensor::cat(pooled, 1); // [batch, windows, dim]

        let x = self.dropout.forward(gelu(self.fc1.forward(x)));
        let x = gelu(self.fc2.forward(x));
        let logits = self.head.forward(x); // [batch, windows, vocab]

        log_softmax(logits, 2).swap_dims(0, 1)
    }

    /// Number of output steps for a sequence of `seq_len` frames.
    #[cfg(test)]
    pub fn output_len(&self, seq_len: usize) -> usize {
        gloss_windows(seq_len, self.stride).len()
    }
}
