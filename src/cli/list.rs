use strum::IntoEnumIterator;
use table::{IntoTable, Table};
mod table;

use xinfer::config::Config;
use xinfer::providers::Routing;
use xinfer::registry::{EntryStatus, Registry};
use xinfer::{InferenceClient, ProviderId, TaskKind};

use crate::{die, ListArgs, ListObject, ListingFormat};

#[derive(serde::Serialize)]
struct Model {
    model_id: String,
    provider: ProviderId,
    provider_id: String,
    task: TaskKind,
    status: EntryStatus,
}

impl From<Vec<Model>> for Table {
    fn from(value: Vec<Model>) -> Self {
        let mut tab = Table::new(&["MODEL", "PROVIDER", "PROVIDER_ID", "TASK", "STATUS"]);

        for model in value {
            tab.add_row(vec![
                model.model_id,
                model.provider.to_string(),
                model.provider_id,
                model.task.to_string(),
                match model.status {
                    EntryStatus::Live => "live".to_string(),
                    EntryStatus::Staging => "staging".to_string(),
                },
            ]);
        }

        tab
    }
}

#[derive(serde::Serialize)]
struct Provider {
    provider: ProviderId,
    priority: u8,
    /// Whether the provider is reached through the Hub router.
    routed: bool,
    tasks: Vec<TaskKind>,
}

impl From<Vec<Provider>> for Table {
    fn from(value: Vec<Provider>) -> Self {
        let mut tab = Table::new(&["PROVIDER", "PRIORITY", "ROUTING", "TASKS"]);

        for provider in value {
            let tasks: Vec<String> = provider.tasks.iter().map(TaskKind::to_string).collect();

            tab.add_row(vec![
                provider.provider.to_string(),
                provider.priority.to_string(),
                if provider.routed {
                    "hub".to_string()
                } else {
                    "client-side".to_string()
                },
                tasks.join(","),
            ]);
        }

        tab
    }
}

fn get_providers(registry: &Registry) -> Vec<Provider> {
    ProviderId::iter()
        .map(|id| {
            let dialect = id.dialect();

            Provider {
                provider: id,
                priority: registry.priority(id),
                routed: dialect.routing == Routing::Hub,
                tasks: dialect.tasks.iter().map(|t| t.task).collect(),
            }
        })
        .collect()
}

fn get_models(registry: &Registry, provider: Option<ProviderId>) -> Vec<Model> {
    registry
        .entries()
        .filter(|entry| provider.map_or(true, |id| entry.provider == id))
        .map(|entry| Model {
            model_id: entry.hf_model_id.clone(),
            provider: entry.provider,
            provider_id: entry.provider_id.clone(),
            task: entry.task,
            status: entry.status,
        })
        .collect()
}

fn format_output<O: IntoTable + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize the listing: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) fn list_cmd(config: &Config, args: &ListArgs) {
    let format = args.format;

    let client = match InferenceClient::from_config(config) {
        Ok(client) => client,
        Err(err) => die!("{}", err),
    };

    let registry = client.registry();

    match &args.object {
        ListObject::Models(args) => {
            if let Some(id) = args.provider {
                if id.dialect().routing == Routing::ClientSide {
                    die!(
                        "{0} is not in the registry, its models are named \"{0}/<model>\"",
                        id
                    );
                }
            }

            format_output(get_models(registry, args.provider), format);
        }
        ListObject::Providers => {
            format_output(get_providers(registry), format);
        }
    }
}
