use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span};

use registry_autologin::registry::{
    image_registry_provider, parse_reference, LoginContext, ProviderOptions,
};
use registry_autologin::settings::Settings;

/// Log into the registry hosting `image` and print the resulting credentials
pub async fn handle_login(
    settings: &Settings,
    flags: ProviderOptions,
    image: &str,
    show_password: bool,
) -> Result<()> {
    let reference = parse_reference(image)?;

    // Flags enable providers on top of whatever the config file enables
    let opts = ProviderOptions {
        aws_auto_login: settings.providers.aws_auto_login || flags.aws_auto_login,
        gcp_auto_login: settings.providers.gcp_auto_login || flags.gcp_auto_login,
        azure_auto_login: settings.providers.azure_auto_login || flags.azure_auto_login,
    };

    let cancellation = CancellationToken::new();
    let ctx = LoginContext::new(cancellation.clone(), info_span!("login", image = %image));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT (Ctrl+C), cancelling login");
            cancellation.cancel();
        }
    });

    let manager = settings.manager();
    let auth = manager
        .login(&ctx, image, &reference, &opts)
        .await
        .with_context(|| format!("Failed to log in for image {}", image))?;

    match auth {
        Some(auth) => {
            println!("Registry: {}", reference.registry());
            println!("Username: {}", auth.username());
            if show_password {
                println!("Password: {}", auth.password());
            } else {
                println!("Password: <hidden, pass --show-password to print>");
            }
        }
        None => {
            println!(
                "{} is not hosted on a supported cloud registry; no login needed",
                reference.registry()
            );
        }
    }

    Ok(())
}

/// Print the provider an image would be routed to
pub fn handle_provider(image: &str) -> Result<()> {
    let reference = parse_reference(image)?;
    let provider = image_registry_provider(image, &reference);
    println!("{}", provider);
    Ok(())
}
