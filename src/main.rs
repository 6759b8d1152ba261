use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bibkeeper::bibtex::{read_bib, split_entries, write_bib};
use bibkeeper::citations::CitationUpdater;
use bibkeeper::crossref::{BooksImporter, BooksOptions, CrossrefClient};
use bibkeeper::dedupe::{find_duplicates, remove_duplicates};
use bibkeeper::exclude::{exclude, ExcludeRequest, ExclusionList};
use bibkeeper::members::load_members;
use bibkeeper::pubmed::{EutilsClient, ImportOptions, PubMedImporter};
use bibkeeper::thesis::{add_thesis, ThesisAuthor, ThesisRequest};
use bibkeeper::{index, workflow, Config, Error};

/// How many new entries a dry run of the books importer prints.
const DRY_RUN_PREVIEW: usize = 5;

/// Maintenance tools for the group bibliography
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (default: built-in project layout)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository root that relative paths are resolved against
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Show detailed progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh citation counts from Crossref for every entry with a DOI
    Citations {
        /// Only process the first N entries with a DOI
        #[arg(long)]
        test: Option<usize>,

        /// Do not write changes to the file
        #[arg(long)]
        dry_run: bool,

        /// Path to the .bib file
        #[arg(long)]
        bib: Option<PathBuf>,
    },

    /// Import new publications from PubMed for group members
    ImportPubmed {
        /// Show what would be added without modifying the bibliography
        #[arg(long)]
        dry_run: bool,

        /// Only import for members whose name contains this
        #[arg(long)]
        member: Option<String>,

        /// Only import publications from this year onwards
        #[arg(long)]
        since: Option<i32>,

        /// Email address sent to NCBI
        #[arg(long)]
        email: Option<String>,

        /// NCBI API key, allows a higher request rate
        #[arg(long)]
        api_key: Option<String>,

        /// Maximum results per member
        #[arg(long)]
        max_results: Option<usize>,

        /// Only process active members
        #[arg(long)]
        active_only: bool,
    },

    /// Import books and book chapters from Crossref for group members
    ImportBooks {
        /// Show what would be added without modifying the bibliography
        #[arg(long)]
        dry_run: bool,

        /// Only import for members whose name contains this
        #[arg(long)]
        member: Option<String>,

        /// Also process members that are not active
        #[arg(long)]
        include_inactive: bool,

        /// Maximum results per query
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Remove entries that repeat an earlier entry's PMID
    Dedupe {
        /// Path to the .bib file
        bib_file: Option<PathBuf>,

        /// Show what would be removed without modifying the file
        #[arg(long)]
        dry_run: bool,
    },

    /// Exclude a publication from a member's list and the bibliography
    Exclude {
        /// PubMed ID to exclude
        #[arg(long)]
        pmid: String,

        /// Member slug (e.g. rob-tolboom)
        #[arg(long)]
        member: String,

        /// Reason for the exclusion
        #[arg(long)]
        reason: String,

        /// Person who excluded the publication
        #[arg(long)]
        excluded_by: Option<String>,
    },

    /// Add a PhD thesis to the bibliography
    #[command(group(ArgGroup::new("who").required(true).args(["member", "author"])))]
    AddThesis {
        /// Member slug (e.g. rob-tolboom)
        #[arg(long)]
        member: Option<String>,

        /// Full author name, for authors without a member profile
        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        title: String,

        #[arg(long)]
        year: i32,

        /// Month, 1 to 12
        #[arg(long)]
        month: Option<u32>,

        /// University or school
        #[arg(long)]
        school: String,

        /// Promotor name(s)
        #[arg(long)]
        promotor: String,

        /// Co-promotor name(s)
        #[arg(long)]
        copromotor: Option<String>,

        /// URL of the thesis, e.g. in an institutional repository
        #[arg(long)]
        url: String,

        #[arg(long = "abstract")]
        abstract_text: String,

        /// Path to the cover image
        #[arg(long)]
        cover_image: PathBuf,
    },

    /// Sync the member choices of the exclusion workflow with the member profiles
    SyncMembers,

    /// Regenerate the JSON indexes for content/<NAME>.bib
    Index {
        /// Bibliography name, e.g. umcg-anes
        name: String,

        /// Only list publications that a member authored
        #[arg(long)]
        members_only: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = cli.root {
        config.paths.root = root;
    }

    match cli.command {
        Command::Citations { test, dry_run, bib } => {
            let bib = bib.unwrap_or_else(|| config.paths.bib_file());
            update_citations(&config, &bib, test, dry_run)
        }
        Command::ImportPubmed {
            dry_run,
            member,
            since,
            email,
            api_key,
            max_results,
            active_only,
        } => {
            if let Some(email) = email {
                config.pubmed.email = email;
            }
            if api_key.is_some() {
                config.pubmed.api_key = api_key;
            }
            let options = ImportOptions {
                member_filter: member,
                since,
                max_results: max_results.unwrap_or(config.pubmed.max_results),
                active_only,
                note: config.pubmed.note.clone(),
                dry_run,
            };
            import_pubmed(&config, &options)
        }
        Command::ImportBooks {
            dry_run,
            member,
            include_inactive,
            max_results,
        } => {
            let options = BooksOptions {
                member_filter: member,
                max_results: max_results.unwrap_or(config.crossref.max_results),
                active_only: !include_inactive,
                dry_run,
            };
            import_books(&config, &options)
        }
        Command::Dedupe { bib_file, dry_run } => {
            let bib = bib_file.unwrap_or_else(|| config.paths.bib_file());
            dedupe(&bib, dry_run)
        }
        Command::Exclude {
            pmid,
            member,
            reason,
            excluded_by,
        } => {
            let request = ExcludeRequest {
                pmid,
                member,
                reason,
                excluded_by: excluded_by.filter(|by| !by.is_empty()),
                date: chrono::Local::now().date_naive(),
            };
            exclude_publication(&config, &request)
        }
        Command::AddThesis {
            member,
            author,
            title,
            year,
            month,
            school,
            promotor,
            copromotor,
            url,
            abstract_text,
            cover_image,
        } => {
            let author = match (author, member) {
                (Some(name), _) => ThesisAuthor::Name(name),
                (None, Some(slug)) => ThesisAuthor::Member(slug),
                (None, None) => anyhow::bail!("Either --member or --author is required"),
            };
            let request = ThesisRequest {
                author,
                title,
                year,
                month,
                school,
                promotor,
                copromotor,
                url,
                abstract_text,
                cover_image,
            };
            thesis(&config, &request)
        }
        Command::SyncMembers => sync_members(&config),
        Command::Index { name, members_only } => build_index(&config, &name, !members_only),
    }
}

fn update_citations(config: &Config, bib: &Path, test: Option<usize>, dry_run: bool) -> Result<()> {
    println!("Crossref Citation Updater");
    println!("BibTeX file: {}", bib.display());
    if let Some(limit) = test {
        println!("TEST MODE: Processing first {limit} entries only");
    }

    let client = CrossrefClient::new(&config.crossref).context("Failed to create Crossref client")?;
    let mut updater = CitationUpdater::new(client, config.crossref.rate_limit());
    let report = updater
        .run(bib, test, dry_run)
        .with_context(|| format!("Failed to update citations in {}", bib.display()))?;

    let elapsed = report.elapsed.as_secs_f64();
    println!("\nStatistics:");
    println!("{}", report.stats);
    println!(
        "Time elapsed:         {elapsed:.1} seconds ({:.1} minutes)",
        elapsed / 60.0
    );
    Ok(())
}

fn import_pubmed(config: &Config, options: &ImportOptions) -> Result<()> {
    let bib = config.paths.bib_file();
    let members_dir = config.paths.members_dir();
    let members = load_members(&members_dir, false)
        .with_context(|| format!("Failed to read members from {}", members_dir.display()))?;
    info!("Found {} members", members.len());
    let exclusions_file = config.paths.exclusions_file();
    let exclusions = ExclusionList::load(&exclusions_file)
        .with_context(|| format!("Failed to read exclusions from {}", exclusions_file.display()))?;

    let client = EutilsClient::new(&config.pubmed).context("Failed to create PubMed client")?;
    let summary = PubMedImporter::new(client)
        .run(&members, &bib, &exclusions, options)
        .context("PubMed import failed")?;

    println!("Summary:");
    println!("  Members searched: {}", summary.members);
    println!("  Total publications found: {}", summary.total_found);
    println!("  New publications to add: {}", summary.total_new);

    if summary.entries.is_empty() {
        println!("No new publications to add.");
    } else if options.dry_run {
        println!("\nDRY RUN: Would add the following entries:\n");
        for entry in &summary.entries {
            println!("{entry}\n");
        }
    } else {
        println!(
            "\nSuccessfully added {} new entries to {}",
            summary.entries.len(),
            bib.display()
        );
        println!("Review the new entries, regenerate the indexes and commit the changes.");
    }
    Ok(())
}

fn import_books(config: &Config, options: &BooksOptions) -> Result<()> {
    let bib = config.paths.bib_file();
    let members_dir = config.paths.members_dir();
    let members = load_members(&members_dir, false)
        .with_context(|| format!("Failed to read members from {}", members_dir.display()))?;

    let client = CrossrefClient::new(&config.crossref).context("Failed to create Crossref client")?;
    let summary = BooksImporter::new(client)
        .run(&members, &bib, options)
        .context("Crossref import failed")?;

    println!("Summary");
    println!("{}", summary.stats);

    if summary.entries.is_empty() {
        println!("No new entries to add");
    } else if options.dry_run {
        println!("\nDRY RUN - would add the following entries:\n");
        for entry in summary.entries.iter().take(DRY_RUN_PREVIEW) {
            println!("{entry}\n");
        }
        if summary.entries.len() > DRY_RUN_PREVIEW {
            println!("... and {} more entries", summary.entries.len() - DRY_RUN_PREVIEW);
        }
    } else {
        println!("Successfully updated {}", bib.display());
    }
    Ok(())
}

fn dedupe(bib: &Path, dry_run: bool) -> Result<()> {
    let content = read_bib(bib).with_context(|| format!("Failed to read {}", bib.display()))?;
    let entries = split_entries(&content);
    println!("Found {} total entries", entries.len());

    let groups = find_duplicates(&entries);
    if groups.is_empty() {
        println!("No duplicates found!");
        return Ok(());
    }
    let total: usize = groups.iter().map(|group| group.duplicates.len()).sum();
    println!("Found {} PMIDs with duplicates", groups.len());
    println!("Total duplicate entries to remove: {total}\n");

    println!("Duplicate details:");
    for group in &groups {
        println!("\nPMID {}: {} entries", group.pmid, group.duplicates.len() + 1);
        for (idx, entry) in group.entries().enumerate() {
            let status = if idx == 0 { "KEEP" } else { "REMOVE" };
            println!("  [{status}] {}", entry.key.unwrap_or("<no key>"));
        }
    }
    println!();

    if dry_run {
        println!("DRY RUN: No changes made to file");
        return Ok(());
    }
    let outcome = remove_duplicates(&content);
    write_bib(bib, &outcome.content).with_context(|| format!("Failed to write {}", bib.display()))?;
    println!("Successfully removed {} duplicate entries", outcome.removed);
    println!("Kept {} unique entries", outcome.kept);
    Ok(())
}

fn exclude_publication(config: &Config, request: &ExcludeRequest) -> Result<()> {
    println!("Excluding PMID: {}", request.pmid);
    println!("Member: {}", request.member);
    println!("Reason: {}\n", request.reason);

    let bib = config.paths.bib_file();
    let outcome = match exclude(
        &config.paths.members_dir(),
        &config.paths.exclusions_file(),
        &bib,
        request,
    ) {
        Ok(outcome) => outcome,
        Err(Error::MemberNotFound {
            slug,
            expected,
            available,
            remaining,
        }) => {
            eprintln!("Error: Member '{slug}' not found.");
            eprintln!("Expected file: {}", expected.display());
            if !available.is_empty() {
                eprintln!("\nAvailable members:");
                for member in &available {
                    eprintln!("  - {member}");
                }
                if remaining > 0 {
                    eprintln!("  ... and {remaining} more");
                }
            }
            anyhow::bail!("Unknown member '{slug}'");
        }
        Err(e) => return Err(e).context("Failed to exclude publication"),
    };

    if let Some(previous) = outcome.previous {
        println!(
            "PMID {} was already excluded for {} ({}), record replaced",
            request.pmid, previous.member, previous.reason
        );
    }
    if outcome.removed_keys.is_empty() {
        println!(
            "Note: PMID {} not found in {} (may have been already removed)",
            request.pmid,
            bib.display()
        );
    } else {
        for key in &outcome.removed_keys {
            println!("Removed entry with PMID {} (key: {key})", request.pmid);
        }
    }
    println!("Updated {}", config.paths.exclusions_file().display());
    Ok(())
}

fn thesis(config: &Config, request: &ThesisRequest) -> Result<()> {
    let outcome = add_thesis(
        &config.paths.members_dir(),
        &config.paths.bib_file(),
        &config.paths.theses_dir(),
        request,
    )
    .context("Failed to add thesis")?;

    println!("Added thesis by {}", outcome.author);
    println!("  BibTeX key:  {}", outcome.key);
    println!("  Cover image: {}", outcome.cover.display());
    Ok(())
}

fn sync_members(config: &Config) -> Result<()> {
    let workflow_file = config.paths.workflow_file();
    let updated = workflow::sync_workflow_members(&config.paths.members_dir(), &workflow_file)
        .with_context(|| format!("Failed to update {}", workflow_file.display()))?;
    match updated {
        Some(count) => println!("Updated {} with {count} members", workflow_file.display()),
        None => println!("{} is already up to date", workflow_file.display()),
    }
    Ok(())
}

fn build_index(config: &Config, name: &str, include_all_publications: bool) -> Result<()> {
    let summary = index::write_index(
        &config.paths.content_dir(),
        &config.paths.members_dir(),
        name,
        include_all_publications,
    )
    .with_context(|| format!("Failed to index {name}.bib"))?;

    println!(
        "Indexed {} entries for {} members and {} groups",
        summary.items, summary.authors, summary.groups
    );
    for file in &summary.files {
        println!("  wrote {}", file.display());
    }
    Ok(())
}
