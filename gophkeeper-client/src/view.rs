//! Interactive terminal menu.
//!
//! The view drives the controller and renders what it returns; it never
//! shares state with the background sync task beyond the controller itself.

use crate::controller::{Controller, SaveOutcome};
use crate::error::ClientError;
use gophkeeper_core::{BinarySecret, CardSecret, CredentialsSecret, SecretItem, TextSecret};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const UNAVAILABLE_NOTICE: &str =
    "server is not available, the change is stored locally and will be synchronized later";

pub async fn run(controller: Arc<Controller>, cancel: CancellationToken) -> io::Result<()> {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let authorized = controller.is_authenticated().await;
        let session_user = controller.session_login().await;
        print_menu(session_user.as_deref());

        let choice = match prompt("> ") {
            Ok(choice) => choice,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };

        let result = if authorized {
            match choice.as_str() {
                "1" | "logout" => {
                    controller.logout().await;
                    println!("logged out");
                    Ok(())
                }
                "2" | "add secret" => add_secret(&controller).await,
                "3" | "get secret" => get_secret(&controller).await,
                "4" | "delete secret" => delete_secret(&controller).await,
                "5" | "list secrets" => list_secrets(&controller).await,
                "6" | "synchronize" => match controller.synchronize(&cancel).await {
                    Ok(()) => {
                        println!("synchronized");
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                "7" | "quit" | "q" => break,
                _ => {
                    println!("unknown command, try again please");
                    Ok(())
                }
            }
        } else {
            match choice.as_str() {
                "1" | "login" => login(&controller, &cancel).await,
                "2" | "register" => register(&controller).await,
                "3" | "quit" | "q" => break,
                _ => {
                    println!("unknown command, try again please");
                    Ok(())
                }
            }
        };

        if let Err(e) = result {
            show_error(&e);
        }
    }

    println!("shutting down...");
    Ok(())
}

fn print_menu(session_user: Option<&str>) {
    println!();
    if let Some(login) = session_user {
        println!("[{login}]");
        println!("1) logout");
        println!("2) add secret");
        println!("3) get secret");
        println!("4) delete secret");
        println!("5) list secrets");
        println!("6) synchronize with remote");
        println!("7) quit");
    } else {
        println!("1) login");
        println!("2) register");
        println!("3) quit");
    }
}

async fn login(controller: &Controller, cancel: &CancellationToken) -> Result<(), ClientError> {
    let login = prompt_required("enter your login")?;
    let password = prompt_password("enter your password")?;

    controller.login(&login, &password, cancel).await?;
    println!("logged in as {login}");
    Ok(())
}

async fn register(controller: &Controller) -> Result<(), ClientError> {
    let login = prompt_required("enter your login")?;
    let password = prompt_password("enter your password")?;
    let repeated = prompt_password("repeat your password")?;

    controller.register(&login, &password, &repeated).await?;
    println!("registered as {login}");
    Ok(())
}

async fn add_secret(controller: &Controller) -> Result<(), ClientError> {
    println!("1) credentials");
    println!("2) text");
    println!("3) binary");
    println!("4) card");
    let variant = prompt("secret type> ")?;

    let item = match variant.as_str() {
        "1" | "credentials" => {
            let name = prompt_required("enter secret name")?;
            let login = prompt_required("enter the login to store")?;
            let password = prompt_password("enter the password to store")?;
            let description = prompt("enter description: ")?;
            SecretItem::Credentials(CredentialsSecret {
                name,
                description,
                login,
                password,
            })
        }
        "2" | "text" => {
            let name = prompt_required("enter secret name")?;
            let text = prompt_required("enter the text to store")?;
            let description = prompt("enter description: ")?;
            SecretItem::Text(TextSecret {
                name,
                description,
                text,
            })
        }
        "3" | "binary" => {
            let name = prompt_required("enter secret name")?;
            let path = prompt_required("enter the path to the file")?;
            let description = prompt("enter description: ")?;
            SecretItem::Binary(BinarySecret::from_file(
                name,
                description,
                Path::new(&path),
            )?)
        }
        "4" | "card" => {
            let name = prompt_required("enter secret name")?;
            let number = prompt_required("enter the card number")?;
            let owner_name = prompt_required("enter the card owner name")?;
            let cvv = prompt_password("enter the cvv")?;
            let description = prompt("enter description: ")?;
            SecretItem::Card(CardSecret {
                name,
                description,
                owner_name,
                number,
                cvv,
            })
        }
        _ => {
            println!("unknown secret type");
            return Ok(());
        }
    };

    match controller.save_secret(&item).await? {
        SaveOutcome::Replicated => println!("secret stored"),
        SaveOutcome::Pending => println!("{UNAVAILABLE_NOTICE}"),
    }
    Ok(())
}

async fn get_secret(controller: &Controller) -> Result<(), ClientError> {
    let name = prompt_required("enter secret name")?;

    let item = match controller.get_secret(&name).await {
        Ok(item) => item,
        Err(ClientError::ItemNotFound) => {
            println!("secret with name \"{name}\" not found");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if let SecretItem::Binary(binary) = &item {
        let dir = prompt("enter the directory where the decoded file will be saved (empty for home): ")?;
        let output = if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        };
        let written = binary.save_to(output.as_deref())?;
        println!("file saved to: {}", written.display());
        return Ok(());
    }

    println!("{}", item.payload_text());
    Ok(())
}

async fn delete_secret(controller: &Controller) -> Result<(), ClientError> {
    let name = prompt_required("enter secret name")?;

    match controller.delete_secret(&name).await {
        Ok(SaveOutcome::Replicated) => println!("secret deleted"),
        Ok(SaveOutcome::Pending) => println!("{UNAVAILABLE_NOTICE}"),
        Err(ClientError::ItemNotFound) => {
            println!("secret with name \"{name}\" not found");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn list_secrets(controller: &Controller) -> Result<(), ClientError> {
    let infos = controller.list_secrets().await?;
    if infos.is_empty() {
        println!("no secrets stored");
        return Ok(());
    }

    println!("{:<24} {:<12} DESCRIPTION", "NAME", "TYPE");
    println!("{}", "-".repeat(56));
    for info in &infos {
        println!(
            "{:<24} {:<12} {}",
            info.name, info.secret_type, info.description
        );
    }
    Ok(())
}

fn show_error(err: &ClientError) {
    eprintln!("error: {err}");
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{message}");
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim().to_string())
}

fn prompt_required(message: &str) -> Result<String, ClientError> {
    let value = prompt(&format!("{message}: "))?;
    if value.is_empty() {
        return Err(ClientError::InvalidInput("a value is required".to_string()));
    }
    Ok(value)
}

fn prompt_password(message: &str) -> Result<String, ClientError> {
    Ok(rpassword::prompt_password(format!("{message}: "))?)
}
