//! People command - list, inspect and edit people and their affiliations

use anyhow::Result;
use bizdir_domain::{
    ListParams, NewPerson, Organization, Page, Person, PersonChanges, PersonFilter,
};
use std::path::PathBuf;

use super::{Directory, join_ids, print_json};
use crate::args::{PeopleArgs, PeopleCommands};

pub async fn execute(args: PeopleArgs, config_path: Option<PathBuf>) -> Result<()> {
    let directory = Directory::open(config_path.as_deref()).await?;
    let service = &directory.people;

    match args.command {
        PeopleCommands::List { list, companies } => {
            let page = service
                .list(&ListParams::from(&list), &PersonFilter { companies })
                .await?;
            if list.json {
                print_json(&page)
            } else {
                print_page(&page);
                Ok(())
            }
        }
        PeopleCommands::Show { id, json } => {
            let person = service.get(id).await?;
            output(&person, json)
        }
        PeopleCommands::Create {
            first_name,
            last_name,
            email,
            phone,
            companies,
            json,
        } => {
            let person = service
                .create(NewPerson {
                    first_name,
                    last_name,
                    email,
                    phone,
                    companies,
                })
                .await?;
            output(&person, json)
        }
        PeopleCommands::Update {
            id,
            first_name,
            last_name,
            email,
            phone,
            companies,
            json,
        } => {
            let person = service
                .update(
                    id,
                    PersonChanges {
                        first_name,
                        last_name,
                        email,
                        phone,
                        companies,
                    },
                )
                .await?;
            output(&person, json)
        }
        PeopleCommands::Delete { id } => {
            service.delete(id).await?;
            println!("Deleted person {}", id);
            Ok(())
        }
        PeopleCommands::Companies { id, json } => {
            let companies = service.companies(id).await?;
            output_companies(id, &companies, json)
        }
        PeopleCommands::Attach {
            id,
            companies,
            json,
        } => {
            let companies = service.attach_companies(id, &companies).await?;
            output_companies(id, &companies, json)
        }
        PeopleCommands::Detach {
            id,
            companies,
            json,
        } => {
            let outcome = service.detach_companies(id, &companies).await?;
            if json {
                print_json(&outcome)
            } else {
                println!(
                    "Detached person {} from: {}",
                    id,
                    join_ids(outcome.detached.iter().copied())
                );
                Ok(())
            }
        }
    }
}

fn output(person: &Person, json: bool) -> Result<()> {
    if json {
        return print_json(person);
    }

    println!("Person #{}", person.id);
    println!("  Name: {} {}", person.first_name, person.last_name);
    println!("  Email: {}", person.email);
    if let Some(ref phone) = person.phone {
        println!("  Phone: {}", phone);
    }
    println!("  Created: {}", person.created_at);
    println!("  Updated: {}", person.updated_at);
    Ok(())
}

fn output_companies(id: i64, companies: &[Organization], json: bool) -> Result<()> {
    if json {
        return print_json(companies);
    }

    println!("Companies of person {} ({} found)", id, companies.len());
    for org in companies {
        println!("  #{} {} [{}]", org.id, org.name, org.slug);
    }
    Ok(())
}

fn print_page(page: &Page<Person>) {
    println!(
        "People (page {}/{}, {} total)",
        page.page, page.last_page, page.total
    );
    println!("=======================");
    for person in &page.data {
        println!(
            "  #{} {} {} <{}>",
            person.id, person.first_name, person.last_name, person.email
        );
    }
}
