use std::io::Write;

use crate::{
    embedding_args::EmbeddingArgs,
    input_output::{InputArgs, OutputArgs},
    logging::{CommandVerbosity, LogArgs},
};

/// Args for the predict command.
#[derive(clap::Args, Debug)]
pub struct PredictArgs {
    /// Saved model state.
    #[arg(long)]
    state: String,

    #[command(flatten)]
    embeddings: EmbeddingArgs,

    /// Ranked word-by-word resolutions per text, tab separated.
    ///
    /// With the default of 1, the model's own generation path is used.
    #[arg(long, default_value = "1")]
    ntop: usize,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[clap(flatten)]
    pub logging: LogArgs,
}

impl PredictArgs {
    /// Regenerate every input line.
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logging.setup_logging(CommandVerbosity::Inference)?;

        let vae = self.embeddings.load_estimator(&self.state)?;
        let texts = self.input.read_texts()?;
        log::info!("Predicting {} texts", texts.len());

        let lines: Vec<String> = if self.ntop > 1 {
            vae.predict_variants(&texts, self.ntop)?
                .into_iter()
                .map(|variants| variants.join("\t"))
                .collect()
        } else {
            vae.predict(&texts)?
        };

        let mut writer = self.output.open_writer()?;
        for line in lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;

        Ok(())
    }
}
