//! Accounts command - key lifecycle: create, import, kill, re-encrypt, export

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use zeroize::Zeroizing;

use hearth_core::ports::{PasswordPrompt, ScriptedPrompt};
use hearth_core::{Account, Address, OperationResult, SecretBytes, ShellContext};

use super::prompt::DialoguerPrompt;
use super::{
    get_context, get_password_or_prompt, get_password_with_confirm, report, Reported, PASSWORD_ENV,
};
use crate::output;

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an account with a freshly generated key
    New {
        /// Display name
        name: String,
        /// Password hint shown when prompting
        #[arg(long)]
        hint: Option<String>,
        /// Password for the new key
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import an existing secret key
    Import {
        /// Display name
        name: String,
        /// Secret key as hex (prompted if omitted)
        #[arg(long)]
        secret: Option<String>,
        /// Password hint shown when prompting
        #[arg(long)]
        hint: Option<String>,
        /// Password for the imported key
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Permanently delete an account's key
    Kill {
        /// Account address or name
        account: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the password of one account
    Reencrypt {
        /// Account address or name
        account: String,
        /// Current password (prompted with the hint if omitted)
        #[arg(long)]
        old_password: Option<String>,
        /// New password
        #[arg(long)]
        new_password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the password of every account, stopping at the first failure
    ReencryptAll {
        /// Current password shared by all accounts (prompted per account if omitted)
        #[arg(long)]
        old_password: Option<String>,
        /// New password
        #[arg(long)]
        new_password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print an account's raw secret key
    Export {
        /// Account address or name
        account: String,
        /// Account password
        #[arg(short, long)]
        password: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check an account's password by unlocking it
    Unlock {
        /// Account address or name
        account: String,
        /// Account password
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Accept an address, or the name of exactly one account
fn resolve_account(ctx: &ShellContext, account: &str) -> Result<Account> {
    if let Ok(address) = account.parse::<Address>() {
        return Ok(ctx.credentials.account(&address)?);
    }

    let mut matches: Vec<Account> = ctx
        .credentials
        .accounts()?
        .into_iter()
        .filter(|a| a.name == account)
        .collect();
    match matches.len() {
        0 => anyhow::bail!("No account named or addressed '{}'", account),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("{} accounts are named '{}'; use the address", n, account),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts. Create one with 'hearth accounts new <name>'.");
        return;
    }

    let mut table = output::table();
    table.set_header(vec!["Address", "Name", "State", "Hint", "Created"]);
    for account in accounts {
        let state = if account.is_locked() {
            "locked".dimmed().to_string()
        } else {
            "unlocked".green().to_string()
        };
        table.add_row(vec![
            account.address.to_string(),
            account.name.clone(),
            state,
            if account.hint.is_some() { "yes" } else { "" }.to_string(),
            account.created_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    println!("{}", table);
}

pub fn run(command: AccountsCommands) -> Result<()> {
    let ctx = get_context()?;
    let outcome = execute(&ctx, command);
    let closed = ctx.shutdown();
    outcome.and(closed)
}

fn execute(ctx: &ShellContext, command: AccountsCommands) -> Result<()> {
    match command {
        AccountsCommands::List { json } => {
            let accounts = ctx.credentials.accounts()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else {
                print_accounts(&accounts);
            }
        }

        AccountsCommands::New {
            name,
            hint,
            password,
            json,
        } => {
            let password = Zeroizing::new(get_password_with_confirm(password, "Password for the new key")?);
            let result = ctx
                .credentials
                .create_account(&name, &password, hint.as_deref());
            report(OperationResult::for_operation("create", &name, result), json, |account| {
                output::success(&format!("✓ Created account {}", account.label()));
                println!("  Address: {}", account.address);
                output::info("The key cannot be recovered without its password.");
            })?;
        }

        AccountsCommands::Import {
            name,
            secret,
            hint,
            password,
            json,
        } => {
            let secret_hex = Zeroizing::new(match secret {
                Some(s) => s,
                None => Password::new().with_prompt("Secret key (hex)").interact()?,
            });
            let bytes = hex::decode(secret_hex.trim().trim_start_matches("0x"))
                .context("Secret key must be hex")?;
            let secret = SecretBytes::new(bytes);

            let password = Zeroizing::new(get_password_with_confirm(password, "Password for the imported key")?);
            let result = ctx
                .credentials
                .import_secret(&name, &secret, &password, hint.as_deref());
            report(OperationResult::for_operation("import", &name, result), json, |account| {
                output::success(&format!("✓ Imported account {}", account.label()));
                println!("  Address: {}", account.address);
            })?;
        }

        AccountsCommands::Kill {
            account,
            force,
            json,
        } => {
            let account = resolve_account(ctx, &account)?;

            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!(
                        "Permanently delete the key for {}? This cannot be undone.",
                        account.label()
                    ))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let subject = account.address.to_string();
            let result = ctx.credentials.kill(&account.address);
            report(OperationResult::for_operation("kill", &subject, result), json, |_| {
                output::success(&format!("✓ Deleted key for {}", account.label()));
            })?;
        }

        AccountsCommands::Reencrypt {
            account,
            old_password,
            new_password,
            json,
        } => {
            let account = resolve_account(ctx, &account)?;
            let subject = account.address.to_string();
            let new_password = Zeroizing::new(get_password_with_confirm(new_password, "New password")?);

            let old_password = old_password.or_else(|| env::var(PASSWORD_ENV).ok());
            let result = match old_password {
                Some(old) => {
                    let old = Zeroizing::new(old);
                    let bar = spinner("Re-encrypting key...");
                    let result = ctx.credentials.reencrypt(&account.address, &old, &new_password);
                    bar.finish_and_clear();
                    result
                }
                None => ctx.credentials.reencrypt_interactive(
                    &account.address,
                    &new_password,
                    &DialoguerPrompt,
                ),
            };
            report(OperationResult::for_operation("reencrypt", &subject, result), json, |_| {
                output::success(&format!("✓ Re-encrypted {}", account.label()));
            })?;
        }

        AccountsCommands::ReencryptAll {
            old_password,
            new_password,
            json,
        } => {
            let new_password = Zeroizing::new(get_password_with_confirm(new_password, "New password for all accounts")?);

            let old_password = old_password.or_else(|| env::var(PASSWORD_ENV).ok());
            let (prompt, bar): (Box<dyn PasswordPrompt>, Option<ProgressBar>) = match old_password {
                Some(old) => (
                    Box::new(ScriptedPrompt::always(old)),
                    Some(spinner("Re-encrypting keys...")),
                ),
                None => (Box::new(DialoguerPrompt), None),
            };

            let outcome = ctx.credentials.reencrypt_all(&new_password, prompt.as_ref());
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }

            match outcome {
                Ok(done) => {
                    if json {
                        println!(
                            "{}",
                            serde_json::json!({"success": true, "reencrypted": done.reencrypted})
                        );
                    } else if done.reencrypted.is_empty() {
                        println!("No accounts to re-encrypt.");
                    } else {
                        for address in &done.reencrypted {
                            println!("  {} {}", "✓".green(), address);
                        }
                        output::success(&format!(
                            "Re-encrypted {} account(s)",
                            done.reencrypted.len()
                        ));
                    }
                }
                Err(e) => {
                    if json {
                        println!(
                            "{}",
                            serde_json::json!({
                                "success": false,
                                "reencrypted": e.completed,
                                "failed": e.failed,
                                "kind": e.source.kind(),
                                "error": e.source.to_string(),
                            })
                        );
                    } else {
                        for address in &e.completed {
                            println!("  {} {}", "✓".green(), address);
                        }
                        if let Some(failed) = &e.failed {
                            println!("  {} {}", "✗".red(), failed);
                        }
                        output::error(&format!("reencrypt_all stopped: {}", e));
                        if !e.completed.is_empty() {
                            output::warning("Accounts marked ✓ already use the new password.");
                        }
                    }
                    return Err(Reported.into());
                }
            }
        }

        AccountsCommands::Export {
            account,
            password,
            force,
            json,
        } => {
            let account = resolve_account(ctx, &account)?;

            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!(
                        "Print the raw secret key of {} to the terminal?",
                        account.label()
                    ))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let password = Zeroizing::new(get_password_or_prompt(password, "Account password")?);
            let subject = account.address.to_string();
            let result = ctx
                .credentials
                .export_key(&account.address, &password)
                .map(|secret| secret.to_hex().to_string());
            report(OperationResult::for_operation("export", &subject, result), json, |hex| {
                println!("{}", hex);
            })?;
        }

        AccountsCommands::Unlock {
            account,
            password,
            json,
        } => {
            let account = resolve_account(ctx, &account)?;
            let password = Zeroizing::new(get_password_or_prompt(password, "Account password")?);
            let subject = account.address.to_string();
            let result = ctx.credentials.unlock(&account.address, &password);
            report(OperationResult::for_operation("unlock", &subject, result), json, |_| {
                output::success(&format!("✓ Password accepted for {}", account.label()));
            })?;
        }
    }

    Ok(())
}
