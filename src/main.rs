//! # RichCard CLI
//!
//! Usage:
//!   richcard card.html -o card.json
//!   echo '<b>Hi</b> there' | richcard --width 300
//!   richcard node.json --node-config -o card.json
//!   richcard --example > card.html
//!
//! Set `RUST_LOG=warn` (or `debug`) to see image fallbacks and markup recovery.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use richcard::{CardConfig, Resources, RichCardError};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_markup());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {}", e);
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), RichCardError> {
    let input = match args.get(1).filter(|a| !a.starts_with('-')) {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let resources = Resources::default();
    let synthesis = if args.iter().any(|a| a == "--node-config") {
        richcard::render_node_json(&input, &resources)?
    } else {
        let config = card_config(args);
        richcard::render(&input, &config, &resources)
    };

    let json = synthesis.to_json()?;
    match flag_value(args, "-o") {
        Some(path) => {
            fs::write(path, &json)?;
            eprintln!(
                "✓ Written {} primitives ({} assets) to {}",
                synthesis.primitives.len(),
                synthesis.assets.len(),
                path
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn card_config(args: &[String]) -> CardConfig {
    let mut config = CardConfig::default();
    if let Some(v) = number_flag(args, "--width") {
        config.max_width = v;
    }
    if let Some(v) = number_flag(args, "--font-size") {
        config.font_size = v;
    }
    if let Some(v) = number_flag(args, "--padding") {
        config.padding = v;
    }
    config
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn number_flag(args: &[String], flag: &str) -> Option<f64> {
    let raw = flag_value(args, flag)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            log::warn!("ignoring {} {:?}: not a non-negative number", flag, raw);
            None
        }
    }
}

fn example_markup() -> &'static str {
    r##"<h1>Sprint review</h1>
<p>Shipped the <b>new importer</b> and fixed <span style="color: #e03131">three</span> regressions.</p>
<p><u>Follow-ups</u></p>
<ul>
  <li><mark>Migrate</mark> the legacy boards</li>
  <li><s>Rewrite the exporter</s> postponed</li>
</ul>
<ol>
  <li>Review the onboarding flow</li>
  <li>Ship <i>dark mode</i></li>
</ol>
<p style="font-size: 12px; color: gray">Posted by the platform team</p>
"##
}
