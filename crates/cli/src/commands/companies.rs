//! Companies command - list, inspect and edit organizations

use anyhow::Result;
use bizdir_domain::{
    ListParams, NewOrganization, Organization, OrganizationChanges, OrganizationKey, Page, Person,
};
use std::path::PathBuf;

use super::{Directory, join_ids, print_json};
use crate::args::{CompaniesArgs, CompaniesCommands};

pub async fn execute(args: CompaniesArgs, config_path: Option<PathBuf>) -> Result<()> {
    let directory = Directory::open(config_path.as_deref()).await?;
    let service = &directory.organizations;

    match args.command {
        CompaniesCommands::List { list } => {
            let page = service.list(&ListParams::from(&list)).await?;
            if list.json {
                print_json(&page)
            } else {
                print_page(&page);
                Ok(())
            }
        }
        CompaniesCommands::Show { key, json } => {
            let org = service.show(&OrganizationKey::parse(&key)).await?;
            output(&org, json)
        }
        CompaniesCommands::Create {
            name,
            tax_id,
            address,
            city,
            zip,
            json,
        } => {
            let org = service
                .create(NewOrganization {
                    name,
                    tax_id,
                    address,
                    city,
                    zip,
                })
                .await?;
            output(&org, json)
        }
        CompaniesCommands::Update {
            id,
            name,
            tax_id,
            address,
            city,
            zip,
            json,
        } => {
            let org = service
                .update(
                    id,
                    OrganizationChanges {
                        name,
                        tax_id,
                        address,
                        city,
                        zip,
                    },
                )
                .await?;
            output(&org, json)
        }
        CompaniesCommands::Delete { id } => {
            service.delete(id).await?;
            println!("Deleted company {}", id);
            Ok(())
        }
        CompaniesCommands::Members { id, json } => {
            let members = service.members(id).await?;
            output_members(id, &members, json)
        }
        CompaniesCommands::Attach { id, people, json } => {
            let members = service.attach_people(id, &people).await?;
            output_members(id, &members, json)
        }
        CompaniesCommands::Sync { id, people, json } => {
            let members = service.replace_people(id, &people).await?;
            output_members(id, &members, json)
        }
        CompaniesCommands::Detach { id, people, json } => {
            let outcome = service.detach_people(id, &people).await?;
            if json {
                print_json(&outcome)
            } else {
                println!(
                    "Detached from company {}: {}",
                    id,
                    join_ids(outcome.detached.iter().copied())
                );
                Ok(())
            }
        }
    }
}

fn output(org: &Organization, json: bool) -> Result<()> {
    if json {
        return print_json(org);
    }

    println!("Company #{}", org.id);
    println!("  Name: {}", org.name);
    println!("  Slug: {}", org.slug);
    println!("  Tax ID: {}", org.tax_id);
    println!("  Address: {}, {} {}", org.address, org.zip, org.city);
    println!("  Created: {}", org.created_at);
    println!("  Updated: {}", org.updated_at);
    Ok(())
}

fn output_members(id: i64, members: &[Person], json: bool) -> Result<()> {
    if json {
        return print_json(members);
    }

    println!("Members of company {} ({} found)", id, members.len());
    for person in members {
        println!(
            "  #{} {} {} <{}>",
            person.id, person.first_name, person.last_name, person.email
        );
    }
    Ok(())
}

fn print_page(page: &Page<Organization>) {
    println!(
        "Companies (page {}/{}, {} total)",
        page.page, page.last_page, page.total
    );
    println!("==========================");
    for org in &page.data {
        println!(
            "  #{} {} [{}] tax id {}, {}",
            org.id, org.name, org.slug, org.tax_id, org.city
        );
    }
}
