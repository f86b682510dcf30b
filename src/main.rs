use anyhow::{bail, Context, Result};
use recipe_gen::api_connection::OpenRouterClient;
use recipe_gen::cli::{parse_args, parse_ingredient_list, render_text, Cli, OutputFormat};
use recipe_gen::config::GenerationConfig;
use recipe_gen::logging::{setup_logging, should_use_json};
use recipe_gen::prompt::PromptTemplate;
use recipe_gen::search::TavilySearch;
use recipe_gen::RecipeGenerator;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

async fn read_ingredients(cli_args: &Cli) -> Result<String> {
    if let Some(ingredients) = &cli_args.ingredients {
        return Ok(ingredients.clone());
    }

    let mut stdout = io::stdout();
    stdout
        .write_all(b"Enter your ingredients, separated by commas: ")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read ingredients from stdin")?;
    Ok(line)
}

async fn load_template(cli_args: &Cli, config: &GenerationConfig) -> Result<PromptTemplate> {
    match &cli_args.template {
        Some(path) => PromptTemplate::load(path).await,
        None => Ok(PromptTemplate::builtin(config.field_naming)),
    }
}

fn build_config(cli_args: &Cli) -> Result<GenerationConfig> {
    let mut config = GenerationConfig::from_env().context("Invalid configuration")?;
    if let Some(model) = &cli_args.model {
        config.model_name = model.clone();
    }
    if let Some(temperature) = cli_args.temperature {
        config.temperature = temperature;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli_args = parse_args();
    setup_logging(cli_args.log_json || should_use_json(), &cli_args.log_level);

    let config = build_config(&cli_args)?;
    let template = load_template(&cli_args, &config).await?;

    let raw_ingredients = read_ingredients(&cli_args).await?;
    let ingredients = parse_ingredient_list(&raw_ingredients)?;
    let joined = ingredients.join(", ");

    let client = OpenRouterClient::new(&config)
        .context("Failed to initialize the generation service client")?;
    info!(model = client.model(), "generation service ready");

    let use_web = !cli_args.no_web && template.uses_web_results();
    let mut generator = RecipeGenerator::new(Arc::new(client), &config);
    if use_web {
        match TavilySearch::new(config.request_timeout) {
            Ok(search) => generator = generator.with_web_search(Arc::new(search)),
            Err(e) => warn!("web search unavailable: {e}"),
        }
    }

    if cli_args.check_safety {
        // An unreadable verdict blocks the request just like a positive one.
        let adversarial = generator
            .check_injection(&ingredients)
            .await
            .context("Safety check could not classify the ingredients")?;
        if adversarial {
            bail!("The ingredient list looks like an attempt to manipulate the assistant; refusing to generate.");
        }
    }

    let recipe = generator
        .generate_recipe(&joined, template.as_str(), use_web)
        .await
        .context("Could not generate a recipe")?;

    match cli_args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&recipe)?),
        OutputFormat::Text => println!("{}", render_text(&recipe)),
    }

    Ok(())
}
