use crate::cli::AnalyzeArgs;
use crate::ld::{
    detect_linkages_with_params, writers::ReportWriter, DetectedLinkageFindings, GenotypeList,
    Linkage, Params, ReferenceCatalog,
};
use crate::utils::{
    create_writer, open_reader, read_catalog, read_cwd_alleles, GlStringRecords, Result,
};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use std::{collections::BTreeSet, sync::Arc, thread};

const CHANNEL_BUFFER_SIZE: usize = 1024;

pub fn analyze(args: AnalyzeArgs) -> Result<()> {
    let catalog = Arc::new(load_catalog(&args)?);
    let linkages = Arc::new(select_linkages(&args.linkages, &catalog));
    if linkages.is_empty() {
        log::warn!("No linkages to search; only non-CWD alleles will be reported");
    } else {
        log::info!(
            "Searching linkages: {}",
            linkages.iter().map(Linkage::name).collect::<Vec<_>>().join(", ")
        );
    }

    let params = Arc::new(Params {
        max_candidates: args.max_candidates,
    });

    let mut report = ReportWriter::new(
        create_writer(args.output_path.as_deref())?,
        args.warnings_only,
    )?;

    // Stage 1 -> 2: Parsed genotypes
    let (genotype_sender, genotype_receiver) =
        bounded::<Result<GenotypeList>>(CHANNEL_BUFFER_SIZE);
    // Stage 2 -> 3: Findings for the writer
    let (findings_sender, findings_receiver) =
        bounded::<DetectedLinkageFindings>(CHANNEL_BUFFER_SIZE);

    // Stage 1: Stream GL Strings (IO: Read input file)
    let reader_thread = {
        let reader = open_reader(&args.input_path)?;
        thread::Builder::new()
            .name("reader".to_string())
            .spawn(move || {
                for record in GlStringRecords::new(reader) {
                    if genotype_sender.send(record).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| format!("Failed to spawn reader thread: {}", e))?
    };

    // Stage 3: Write the report (IO: Write TSV)
    let writer_thread = thread::Builder::new()
        .name("writer".to_string())
        .spawn(move || -> Result<(usize, usize)> {
            let (mut n_genotypes, mut n_anomalies) = (0, 0);
            for findings in &findings_receiver {
                n_genotypes += 1;
                if findings.has_anomalies() {
                    n_anomalies += 1;
                }
                report.write(&findings)?;
            }
            report.finish()?;
            Ok((n_genotypes, n_anomalies))
        })
        .map_err(|e| format!("Failed to spawn writer thread: {}", e))?;

    // Stage 2: Worker pool for linkage detection
    let pool = initialize_thread_pool(args.num_threads)?;
    pool.install(|| {
        genotype_receiver.into_iter().par_bridge().for_each_with(
            findings_sender,
            |s, genotype_result| match genotype_result {
                Ok(genotype) => process_genotype(genotype, &catalog, &linkages, &params, s),
                Err(err) => log::error!("{}", err),
            },
        );
    });

    log::debug!("Analysis complete. Shutting down pipeline threads...");

    match reader_thread.join() {
        Ok(_) => log::trace!("Reader thread has finished."),
        Err(_) => log::error!("Reader thread panicked."),
    }

    let outcome = match writer_thread.join() {
        Ok(Ok((n_genotypes, n_anomalies))) => {
            log::trace!("Writer thread has finished.");
            log::info!(
                "Analyzed {} genotypes, {} with unlinked loci",
                n_genotypes,
                n_anomalies
            );
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err("Writer thread panicked".to_string()),
    };
    log::debug!("All pipeline threads shut down.");
    outcome
}

fn load_catalog(args: &AnalyzeArgs) -> Result<ReferenceCatalog> {
    let mut catalog = ReferenceCatalog::new(args.hladb.as_str());
    for path in &args.frequency_paths {
        let (loci, elements) = read_catalog(path)?;
        log::info!(
            "Loaded {} disequilibrium elements from {}",
            elements.len(),
            path.display()
        );
        catalog.add_elements(loci, elements);
    }
    if let Some(path) = &args.cwd_path {
        let alleles = read_cwd_alleles(path)?;
        log::info!("Loaded {} CWD alleles from {}", alleles.len(), path.display());
        catalog = catalog.with_cwd_alleles(alleles)?;
    }
    Ok(catalog)
}

/// Explicitly requested linkages win. Otherwise every catalog group is
/// searched, the well known groups first.
fn select_linkages(requested: &[Linkage], catalog: &ReferenceCatalog) -> Vec<Linkage> {
    if !requested.is_empty() {
        for linkage in requested {
            if catalog.elements_for(linkage.loci()).is_empty() {
                log::warn!("No catalog elements for linkage {}", linkage);
            }
        }
        return requested.to_vec();
    }

    let mut selected: Vec<Linkage> = Linkage::defaults()
        .into_iter()
        .filter(|linkage| !catalog.elements_for(linkage.loci()).is_empty())
        .collect();
    let known: BTreeSet<_> = selected.iter().map(|l| l.loci().clone()).collect();
    for group in catalog.groups() {
        if known.contains(group) {
            continue;
        }
        match Linkage::new(group.clone()) {
            Ok(linkage) => selected.push(linkage),
            Err(e) => log::warn!("Skipping catalog group: {}", e),
        }
    }
    selected
}

fn process_genotype(
    genotype: GenotypeList,
    catalog: &ReferenceCatalog,
    linkages: &[Linkage],
    params: &Params,
    sender_result: &Sender<DetectedLinkageFindings>,
) {
    match detect_linkages_with_params(&genotype, catalog, linkages, params) {
        Ok(findings) => {
            if let Err(e) = sender_result.send(findings) {
                log::error!("Failed to send findings to writer thread: {}", e);
            }
        }
        Err(err) => {
            log::error!("Error analyzing genotype {}: {}", genotype.id(), err);
        }
    }
}

fn initialize_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    log::debug!(
        "Initializing analysis thread pool with {} threads...",
        num_threads
    );
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("hlald-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ld::{DisequilibriumElement, Locus};
    use std::io::Write;

    fn catalog_with_groups(groups: &[&[&str]]) -> ReferenceCatalog {
        let mut catalog = ReferenceCatalog::new("3.25.0");
        for alleles in groups {
            let element = DisequilibriumElement::from_alleles(*alleles).unwrap();
            let loci = element.loci().collect::<BTreeSet<Locus>>();
            catalog.add_elements(loci, vec![element]);
        }
        catalog
    }

    #[test]
    fn requested_linkages_are_kept() {
        let catalog = catalog_with_groups(&[&["HLA-C*07:01", "HLA-B*08:01"]]);
        let requested: Vec<Linkage> = vec!["DQA1~DQB1".parse().unwrap()];
        let selected = select_linkages(&requested, &catalog);
        assert_eq!(selected, requested);
    }

    #[test]
    fn default_linkages_follow_catalog_groups() {
        let catalog = catalog_with_groups(&[
            &["HLA-A*01:01", "HLA-DPB1*04:01"],
            &["HLA-DRB1*03:01", "HLA-DQB1*02:01"],
            &["HLA-C*07:01", "HLA-B*08:01"],
        ]);
        let selected = select_linkages(&[], &catalog);
        assert_eq!(
            selected.iter().map(Linkage::name).collect::<Vec<_>>(),
            vec!["C~B", "DRB1~DQB1", "A~DPB1"]
        );
    }

    #[test]
    fn analyze_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("glstrings.txt");
        let freqs = dir.path().join("c_b.tsv");
        let cwd = dir.path().join("cwd.txt");
        let output = dir.path().join("report.tsv");
        std::fs::File::create(&input)
            .unwrap()
            .write_all(
                b"S1\tHLA-C*07:01+HLA-C*07:02^HLA-B*08:01+HLA-B*07:02\n\
                  S2\tHLA-C*07:01+\n",
            )
            .unwrap();
        std::fs::File::create(&freqs)
            .unwrap()
            .write_all(b"C\tB\tCAU\nHLA-C*07:01\tHLA-B*08:01\t0.1\nHLA-C*07:02\tHLA-B*07:02\t0.1\n")
            .unwrap();
        std::fs::File::create(&cwd)
            .unwrap()
            .write_all(b"HLA-C*07:01\nHLA-C*07:02\nHLA-B*08:01\n")
            .unwrap();

        let args = AnalyzeArgs {
            input_path: input,
            frequency_paths: vec![freqs],
            cwd_path: Some(cwd),
            linkages: Vec::new(),
            output_path: Some(output.clone()),
            hladb: "3.25.0".to_string(),
            warnings_only: false,
            num_threads: 2,
            max_candidates: 1000,
        };
        analyze(args).unwrap();

        let report = std::fs::read_to_string(output).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "id\tlinkage\thaplotype1\thaplotype2\thladb");
        assert_eq!(lines.len(), 3);
        assert!(lines.contains(&"S1\tC~B\tHLA-C*07:01~HLA-B*08:01\tHLA-C*07:02~HLA-B*07:02\t3.25.0"));
        assert!(lines.contains(&"S1\tNON_CWD\tHLA-B*07:02\t-\t3.25.0"));
    }
}
