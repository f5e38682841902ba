use clap::Parser;
use color_eyre::Result;
use portrait_engine::{GenerationRequest, PortraitService, proxy};
use portrait_studio::{
    cli::{Cli, Command, Edit, Generate, Proxy},
    load_config, report, source_image, write_png,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;
    let Cli {
        provider,
        config,
        command,
    } = Cli::parse();

    let mut cfg = load_config(config.as_deref())?;
    if let Some(provider) = provider {
        cfg.active_provider = provider;
    }

    let (request, output) = match command {
        Command::Generate(Generate { prompt, output }) => {
            (GenerationRequest::generate(prompt), output)
        }
        Command::Edit(Edit {
            image,
            prompt,
            output,
        }) => (GenerationRequest::edit(source_image(&image)?, prompt), output),
        Command::Proxy(Proxy { bind }) => {
            let listener = TcpListener::bind(bind).await?;
            proxy::serve(listener, reqwest::Client::new()).await?;
            return Ok(());
        }
    };

    let service = PortraitService::from_config(&cfg);
    let generated = service.run(&request).await?;
    let written = write_png(&output, &generated.image)?;
    println!("{}", report(&output, written, generated.seed.as_deref()));

    Ok(())
}
