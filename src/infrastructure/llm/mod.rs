mod anthropic;

pub use anthropic::AnthropicGenerator;
