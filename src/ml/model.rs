use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        transformer::{
            TransformerDecoder, TransformerDecoderConfig, TransformerDecoderInput,
            TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput,
        },
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig,
    },
    prelude::*,
};

use crate::domain::traits::LabelShifter;

/// What the training wrapper needs from a sequence-to-sequence model.
pub trait Seq2SeqModel<B: Backend> {
    /// ids/mask: `[batch, src_len]`, decoder ids: `[batch, tgt_len]`
    /// → logits `[batch, tgt_len, vocab]`.
    fn forward_logits(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        attention_mask:    Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3>;

    /// Longest sequence the position embeddings cover.
    fn max_positions(&self) -> usize;
}

// #[derive(Config)] already generates Clone and Serialize/Deserialize;
// adding them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    #[config(default = 256)]
    pub d_model:     usize,
    #[config(default = 4)]
    pub num_heads:   usize,
    #[config(default = 3)]
    pub num_layers:  usize,
    #[config(default = 1024)]
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
    #[config(default = 0)]
    pub pad_token_id: usize,
    /// T5 convention: decoding starts from the pad token.
    #[config(default = 0)]
    pub decoder_start_token_id: usize,
}

impl Seq2SeqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqTransformer<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let encoder = TransformerEncoderConfig::new(self.d_model, self.d_ff, self.num_heads, self.num_layers)
            .with_dropout(self.dropout)
            .init(device);
        let decoder = TransformerDecoderConfig::new(self.d_model, self.d_ff, self.num_heads, self.num_layers)
            .with_dropout(self.dropout)
            .init(device);
        let lm_head = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        Seq2SeqTransformer {
            token_embedding, position_embedding, encoder, decoder, lm_head, dropout,
            max_seq_len: self.max_seq_len,
        }
    }
}

impl LabelShifter for Seq2SeqConfig {
    fn decoder_start_token_id(&self) -> i32 {
        self.decoder_start_token_id as i32
    }

    fn pad_token_id(&self) -> i32 {
        self.pad_token_id as i32
    }
}

/// Encoder-decoder transformer with a shared token embedding and
/// learned positions.
#[derive(Module, Debug)]
pub struct Seq2SeqTransformer<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub encoder:            TransformerEncoder<B>,
    pub decoder:            TransformerDecoder<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> Seq2SeqTransformer<B> {
    fn embed(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let tok_emb = self.token_embedding.forward(ids);

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        self.dropout.forward(tok_emb + pos_emb)
    }
}

impl<B: Backend> Seq2SeqModel<B> for Seq2SeqTransformer<B> {
    fn forward_logits(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        attention_mask:    Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, tgt_len] = decoder_input_ids.dims();
        let device = input_ids.device();

        // mask_pad is true where attention must be blocked
        let source_pad = attention_mask.equal_elem(0);

        let memory = self.encoder.forward(
            TransformerEncoderInput::new(self.embed(input_ids)).mask_pad(source_pad.clone()),
        );

        let causal = generate_autoregressive_mask::<B>(batch_size, tgt_len, &device);
        let hidden = self.decoder.forward(
            TransformerDecoderInput::new(self.embed(decoder_input_ids), memory)
                .target_mask_attn(causal)
                .memory_mask_pad(source_pad),
        );

        self.lm_head.forward(hidden)
    }

    fn max_positions(&self) -> usize {
        self.max_seq_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn ids(values: Vec<i32>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    #[test]
    fn test_forward_logits_shape() {
        let config = Seq2SeqConfig::new(20, 8)
            .with_d_model(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(32);
        let model = config.init::<TestBackend>(&Default::default());

        let logits = model.forward_logits(
            ids(vec![3, 4, 1, 0, 5, 1, 0, 0], [2, 4]),
            ids(vec![1, 1, 1, 0, 1, 1, 0, 0], [2, 4]),
            ids(vec![0, 6, 7, 1, 0, 8, 1, 0], [2, 4]),
        );

        assert_eq!(logits.dims(), [2, 4, 20]);
        assert_eq!(model.max_positions(), 8);
    }

    #[test]
    fn test_config_shifts_like_t5() {
        let config = Seq2SeqConfig::new(32, 16);
        assert_eq!(config.shift_right(&[9, 8, 1, 0]), vec![0, 9, 8, 1]);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Seq2SeqConfig::new(100, 64).with_num_layers(2);
        let json   = serde_json::to_string(&config).unwrap();
        let back: Seq2SeqConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vocab_size, 100);
        assert_eq!(back.num_layers, 2);
        assert_eq!(back.d_model, 256);
    }
}
