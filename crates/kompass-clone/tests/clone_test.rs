//! End-to-end clone runs against the in-memory content store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kompass_clone::{
    CloneConfig, CloneOrchestrator, LinkRewriter, MemoryContentStore, PathLinkScanner, RemapTables,
};
use kompass_core::{extract_timestamp, ContentStore, Error, PageStatus, PageType, Plan, Theme};

/// Template forest used by most tests.
///
/// ```text
/// Vorsorgen (precautions)
/// ├── Hochwasser      section  [basic]
/// │   ├── Checkliste  content  [basic]       blocks: Wasser, Strom
/// │   ├── Entwurf     content  [basic]       hidden
/// │   └── Merkblatt   file     [basic]
/// ├── Notvorrat       content  [basic, pro]  blocks: Vorrat
/// └── Profi           content  [pro]
/// Bewältigen (deal_with)
/// └── Erste Hilfe     content  [basic]       blocks: Verband
/// ```
struct Fixture {
    store: Arc<MemoryContentStore>,
    deal_with: i64,
    flood: i64,
    checklist: i64,
    leaflet: i64,
    supplies: i64,
    pro_only: i64,
    first_aid: i64,
    supplies_block: i64,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryContentStore::new());

    let precautions = store.add_template_root(Theme::Precautions);
    let deal_with = store.add_template_root(Theme::DealWith);

    let flood = store.add_template_page(precautions, PageType::Section, "Hochwasser", &[Plan::Basic]);
    let checklist = store.add_template_page(flood, PageType::Content, "Checkliste", &[Plan::Basic]);
    let draft = store.add_template_page(flood, PageType::Content, "Entwurf", &[Plan::Basic]);
    store.set_status(draft, PageStatus::Hidden);
    let leaflet = store.add_template_page(flood, PageType::File, "Merkblatt", &[Plan::Basic]);
    store.add_file(leaflet, "uploads/merkblatt-hochwasser.pdf");

    let supplies = store.add_template_page(
        precautions,
        PageType::Content,
        "Notvorrat",
        &[Plan::Basic, Plan::Pro],
    );
    let pro_only = store.add_template_page(precautions, PageType::Content, "Profi", &[Plan::Pro]);
    let first_aid = store.add_template_page(deal_with, PageType::Content, "Erste Hilfe", &[Plan::Basic]);

    let supplies_block = store.add_block(supplies, "Vorrat", Some("Für 10 Tage planen."));
    store.add_block(
        checklist,
        "Wasser",
        Some(&format!(
            r#"Siehe <a href="/admin/page/{supplies}#block-{supplies_block}">Vorrat</a> und <a href="/admin/page/{pro_only}">Profi</a>."#
        )),
    );
    store.add_block_with_readmore(
        checklist,
        "Strom",
        None,
        Some(&format!("Mehr unter /admin/page/{flood}")),
    );
    store.add_block(first_aid, "Verband", Some("Kein Link."));

    Fixture {
        store,
        deal_with,
        flood,
        checklist,
        leaflet,
        supplies,
        pro_only,
        first_aid,
        supplies_block,
    }
}

fn orchestrator(store: &Arc<MemoryContentStore>, config: CloneConfig) -> CloneOrchestrator {
    CloneOrchestrator::new(Arc::clone(store) as Arc<dyn ContentStore>, config)
}

/// Title, type and block titles of a page plus its subtree.
#[derive(Debug, PartialEq)]
struct Node {
    title: String,
    page_type: PageType,
    blocks: Vec<String>,
    children: Vec<Node>,
}

fn node(title: &str, page_type: PageType, blocks: &[&str], children: Vec<Node>) -> Node {
    Node {
        title: title.to_string(),
        page_type,
        blocks: blocks.iter().map(|b| b.to_string()).collect(),
        children,
    }
}

fn shape(store: &MemoryContentStore, page_id: i64) -> Vec<Node> {
    store
        .children(page_id)
        .into_iter()
        .map(|p| Node {
            blocks: store.blocks_of(p.id).into_iter().map(|b| b.title).collect(),
            children: shape(store, p.id),
            title: p.title,
            page_type: p.page_type,
        })
        .collect()
}

fn child_by_title(store: &MemoryContentStore, parent_id: i64, title: &str) -> i64 {
    store
        .children(parent_id)
        .into_iter()
        .find(|p| p.title == title)
        .map(|p| p.id)
        .unwrap_or_else(|| panic!("no child {title:?} under {parent_id}"))
}

#[tokio::test]
async fn test_copy_mirrors_visible_plan_tree() {
    let f = fixture();
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    let precautions_root = f.store.organization_root(org, Theme::Precautions).unwrap();
    assert_eq!(
        shape(&f.store, precautions_root.id),
        vec![
            node(
                "Hochwasser",
                PageType::Section,
                &[],
                vec![
                    node("Checkliste", PageType::Content, &["Wasser", "Strom"], vec![]),
                    node("Merkblatt", PageType::File, &[], vec![]),
                ],
            ),
            node("Notvorrat", PageType::Content, &["Vorrat"], vec![]),
        ]
    );

    let deal_with_root = f.store.organization_root(org, Theme::DealWith).unwrap();
    assert_eq!(
        shape(&f.store, deal_with_root.id),
        vec![node("Erste Hilfe", PageType::Content, &["Verband"], vec![])]
    );

    // Copies belong to the organization and keep the template attributes.
    let flood_copy = child_by_title(&f.store, precautions_root.id, "Hochwasser");
    let leaflet_copy = child_by_title(&f.store, flood_copy, "Merkblatt");
    let copy = f.store.page(leaflet_copy).unwrap();
    let source = f.store.page(f.leaflet).unwrap();
    assert_eq!(copy.organization_id, Some(org));
    assert_eq!(copy.theme, source.theme);
    assert_eq!(copy.sort, source.sort);
    assert_eq!(copy.language_tag, source.language_tag);
    assert_eq!(
        f.store.file(leaflet_copy).unwrap().path,
        "uploads/merkblatt-hochwasser.pdf"
    );

    assert_eq!(report.pages_copied, 5);
    assert_eq!(report.blocks_copied, 4);
    assert_eq!(report.files_copied, 1);
    assert!(!report.degraded);
    assert!(report.branch_failures.is_empty());
    assert_eq!(f.store.organization_page_count(org), Theme::ALL.len() + 5);
}

#[tokio::test]
async fn test_links_point_at_copies() {
    let f = fixture();
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    let flood_copy = child_by_title(&f.store, root.id, "Hochwasser");
    let checklist_copy = child_by_title(&f.store, flood_copy, "Checkliste");
    let supplies_copy = child_by_title(&f.store, root.id, "Notvorrat");
    let supplies_block_copy = f.store.blocks_of(supplies_copy)[0].id;

    let blocks = f.store.blocks_of(checklist_copy);
    assert_eq!(
        blocks[0].content.as_deref().unwrap(),
        format!(
            r#"Siehe <a href="/organization/{org}/page/{supplies_copy}#block-{supplies_block_copy}">Vorrat</a> und <a href="/admin/page/{}">Profi</a>."#,
            f.pro_only
        )
    );
    assert_eq!(
        blocks[1].readmore.as_deref().unwrap(),
        format!("Mehr unter /organization/{org}/page/{flood_copy}")
    );
    assert_eq!(report.blocks_rewritten, 2);

    // Template blocks are never touched.
    let template_blocks = f.store.blocks_of(f.checklist);
    assert!(template_blocks[0]
        .content
        .as_deref()
        .unwrap()
        .contains(&format!("/admin/page/{}#block-{}", f.supplies, f.supplies_block)));
}

#[tokio::test]
async fn test_report_start_matches_run_id() {
    let f = fixture();
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    assert_eq!(report.run_id.get_version_num(), 7);
    assert_eq!(Some(report.started_at), extract_timestamp(&report.run_id));
}

#[tokio::test]
async fn test_plan_without_default_content_is_noop() {
    let f = fixture();
    let org = f.store.add_organization(Plan::School);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::School)
        .await
        .unwrap();

    assert_eq!(report.pages_copied, 0);
    assert_eq!(report.blocks_copied, 0);
    assert_eq!(report.blocks_rewritten, 0);
    assert!(!report.degraded);
    assert_eq!(f.store.organization_page_count(org), Theme::ALL.len());
    assert!(f.store.touched_pages().is_empty());
}

#[tokio::test]
async fn test_pro_plan_takes_only_pro_pages() {
    let f = fixture();
    let org = f.store.add_organization(Plan::Pro);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Pro)
        .await
        .unwrap();

    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    let titles: Vec<String> = f.store.children(root.id).into_iter().map(|p| p.title).collect();
    assert_eq!(titles, vec!["Notvorrat".to_string(), "Profi".to_string()]);
    assert_eq!(report.pages_copied, 2);
}

#[tokio::test]
async fn test_failed_block_copy_keeps_rest_of_branch() {
    let f = fixture();
    f.store.fail_block_insert(f.checklist);
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    let flood_copy = child_by_title(&f.store, root.id, "Hochwasser");
    let checklist_copy = child_by_title(&f.store, flood_copy, "Checkliste");
    assert!(f.store.blocks_of(checklist_copy).is_empty());
    child_by_title(&f.store, flood_copy, "Merkblatt");
    child_by_title(&f.store, root.id, "Notvorrat");

    assert_eq!(report.pages_copied, 5);
    assert_eq!(report.blocks_copied, 2);
    assert_eq!(report.copy_failures.len(), 1);
    assert_eq!(report.copy_failures[0].source_page_id, f.checklist);
    assert_eq!(report.copy_failures[0].stage, "blocks");
    assert!(report.branch_failures.is_empty());
    assert!(report.degraded);
}

#[tokio::test]
async fn test_failed_children_lookup_skips_only_that_section() {
    let f = fixture();
    f.store.fail_children_of(f.flood);
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    let flood_copy = child_by_title(&f.store, root.id, "Hochwasser");
    assert!(f.store.children(flood_copy).is_empty());
    assert_eq!(report.pages_copied, 3);
    assert_eq!(report.copy_failures[0].stage, "children");
}

#[tokio::test]
async fn test_failed_branch_does_not_stop_other_themes() {
    let f = fixture();
    f.store.fail_page_insert(f.first_aid);
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    assert_eq!(report.failed_branches, 1);
    assert_eq!(report.branch_failures[0].theme, Theme::DealWith);
    let deal_with_root = f.store.organization_root(org, Theme::DealWith).unwrap();
    assert!(f.store.children(deal_with_root.id).is_empty());

    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    assert_eq!(f.store.children(root.id).len(), 2);
    assert_eq!(report.pages_copied, 4);
    assert!(report.degraded);
}

#[tokio::test]
async fn test_missing_organization_roots_fail_branches_not_run() {
    let f = fixture();

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(9_999, Plan::Basic)
        .await
        .unwrap();

    assert_eq!(report.pages_copied, 0);
    let themes: HashSet<Theme> = report.branch_failures.iter().map(|b| b.theme).collect();
    assert_eq!(themes, HashSet::from([Theme::Precautions, Theme::DealWith]));
}

#[tokio::test]
async fn test_rewrite_failure_is_hard_error_and_copies_persist() {
    let f = fixture();
    f.store.fail_block_updates();
    let org = f.store.add_organization(Plan::Basic);

    let err = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(f.store.organization_page_count(org), Theme::ALL.len() + 5);
}

#[tokio::test]
async fn test_template_root_failure_is_hard_error() {
    let f = fixture();
    f.store.fail_template_roots();
    let org = f.store.add_organization(Plan::Basic);

    let err = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(f.store.organization_page_count(org), Theme::ALL.len());
    assert!(f.store.touched_pages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_counts_pages_committed_before_abort() {
    let f = fixture();
    f.store.slow_blocks_of(f.first_aid, Duration::from_secs(3_600));
    let org = f.store.add_organization(Plan::Basic);

    let config = CloneConfig::default().with_deadline(Duration::from_secs(5));
    let report = orchestrator(&f.store, config)
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    assert!(report.timed_out);
    assert_eq!(report.branch_failures.len(), 1);
    assert_eq!(report.branch_failures[0].theme, Theme::DealWith);

    // Erste Hilfe was committed before the branch stalled on its blocks.
    let deal_with_root = f.store.organization_root(org, Theme::DealWith).unwrap();
    let first_aid_copy = child_by_title(&f.store, deal_with_root.id, "Erste Hilfe");
    assert!(f.store.blocks_of(first_aid_copy).is_empty());
    assert_eq!(
        report.pages_copied,
        f.store.organization_page_count(org) - Theme::ALL.len()
    );
    assert_eq!(report.pages_copied, 5);
    assert_eq!(report.blocks_copied, 3);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_aborts_slow_branch_and_degrades() {
    let f = fixture();
    f.store.slow_children_of(f.deal_with, Duration::from_secs(3_600));
    let org = f.store.add_organization(Plan::Basic);

    let config = CloneConfig::default().with_deadline(Duration::from_secs(5));
    let report = orchestrator(&f.store, config)
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    assert!(report.timed_out);
    assert!(report.degraded);
    assert_eq!(report.branch_failures.len(), 1);
    assert_eq!(report.branch_failures[0].theme, Theme::DealWith);
    assert!(report.branch_failures[0].error.contains("deadline"));

    // The fast branch was committed and its links rewritten.
    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    assert_eq!(f.store.children(root.id).len(), 2);
    assert_eq!(report.pages_copied, 4);
    assert_eq!(report.blocks_rewritten, 2);
}

#[tokio::test]
async fn test_pages_with_writes_are_touched() {
    let f = fixture();
    let org = f.store.add_organization(Plan::Basic);

    orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    let root = f.store.organization_root(org, Theme::Precautions).unwrap();
    let flood_copy = child_by_title(&f.store, root.id, "Hochwasser");
    let touched: HashSet<i64> = f.store.touched_pages().into_iter().collect();
    assert!(touched.contains(&child_by_title(&f.store, flood_copy, "Checkliste")));
    assert!(touched.contains(&child_by_title(&f.store, flood_copy, "Merkblatt")));
    assert!(touched.contains(&child_by_title(&f.store, root.id, "Notvorrat")));
    assert!(!touched.contains(&flood_copy));

    let deal_with_root = f.store.organization_root(org, Theme::DealWith).unwrap();
    assert!(touched.contains(&child_by_title(&f.store, deal_with_root.id, "Erste Hilfe")));
    assert!(!touched.contains(&root.id));
    assert!(!touched.contains(&deal_with_root.id));
}

#[tokio::test]
async fn test_touch_failures_are_counted_not_fatal() {
    let f = fixture();
    f.store.fail_touches();
    let org = f.store.add_organization(Plan::Basic);

    let report = orchestrator(&f.store, CloneConfig::default())
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    // Checkliste, Merkblatt, Notvorrat, Erste Hilfe
    assert_eq!(report.background_failures, 4);
    assert!(!report.degraded);
}

#[tokio::test]
async fn test_touches_can_be_disabled() {
    let f = fixture();
    let org = f.store.add_organization(Plan::Basic);

    orchestrator(&f.store, CloneConfig::default().with_touch_pages(false))
        .clone_default_content(org, Plan::Basic)
        .await
        .unwrap();

    assert!(f.store.touched_pages().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_branches_fill_remap_without_loss() {
    let store = Arc::new(MemoryContentStore::new());
    for theme in Theme::ALL {
        let root = store.add_template_root(theme);
        for i in 0..20 {
            let title = format!("{theme} {i}");
            let page = store.add_template_page(root, PageType::Content, &title, &[Plan::Conference]);
            for b in 0..3 {
                let link = format!("/admin/page/{root}");
                store.add_block(page, &format!("block {b}"), Some(&link));
            }
        }
    }
    let org = store.add_organization(Plan::Conference);

    let report = orchestrator(&store, CloneConfig::default().with_link_batch_size(7))
        .clone_default_content(org, Plan::Conference)
        .await
        .unwrap();

    assert_eq!(report.pages_copied, 6 * 20);
    assert_eq!(report.blocks_copied, 6 * 20 * 3);
    assert!(!report.degraded);

    let mut block_ids = HashSet::new();
    for theme in Theme::ALL {
        let root = store.organization_root(org, theme).unwrap();
        let pages = store.children(root.id);
        assert_eq!(pages.len(), 20);
        for page in pages {
            assert_eq!(page.theme, theme);
            for block in store.blocks_of(page.id) {
                assert!(block_ids.insert(block.id));
            }
        }
    }
    assert_eq!(block_ids.len(), 360);
    // Roots are not copied, so links to them stay untouched.
    assert_eq!(report.blocks_rewritten, 0);
}

#[tokio::test]
async fn test_rewriter_maps_page_and_anchor() {
    let store = Arc::new(MemoryContentStore::new());
    let root = store.add_template_root(Theme::EGfs);
    let page = store.add_template_page(root, PageType::Content, "GFS", &[]);
    let block = store.add_block(page, "Link", Some("/admin/page/42#block-7"));

    let remap = RemapTables::new();
    remap.pages.insert(42, 142);
    remap.blocks.insert(7, 107);
    remap.blocks.insert(block - 1_000, block);

    let rewriter = LinkRewriter::new(
        Arc::clone(&store) as Arc<dyn ContentStore>,
        Arc::new(PathLinkScanner::new()),
        50,
    );
    let stats = rewriter.fix_links(9, &remap).await.unwrap();

    assert_eq!(stats.rewritten, 1);
    assert_eq!(
        store.block(block).unwrap().content.as_deref(),
        Some("/organization/9/page/142#block-107")
    );
}

#[tokio::test]
async fn test_rewriter_pages_through_batches() {
    let store = Arc::new(MemoryContentStore::new());
    let root = store.add_template_root(Theme::EAvoid);
    let page = store.add_template_page(root, PageType::Content, "Vermeiden", &[]);

    let remap = RemapTables::new();
    remap.pages.insert(5, 500);
    for i in 0..5 {
        let id = store.add_block(page, &format!("b{i}"), Some("/admin/page/5"));
        remap.blocks.insert(10_000 + i, id);
    }

    let rewriter = LinkRewriter::new(
        Arc::clone(&store) as Arc<dyn ContentStore>,
        Arc::new(PathLinkScanner::new()),
        2,
    );
    let stats = rewriter.fix_links(3, &remap).await.unwrap();

    assert_eq!(stats.scanned, 5);
    assert_eq!(stats.rewritten, 5);
    assert_eq!(stats.batches, 3);
    for block in store.blocks_of(page) {
        assert_eq!(block.content.as_deref(), Some("/organization/3/page/500"));
    }
}

#[tokio::test]
async fn test_rewriter_is_noop_with_empty_tables() {
    let store = Arc::new(MemoryContentStore::new());
    store.fail_block_updates();

    let remap = RemapTables::new();
    remap.pages.insert(1, 2);

    let rewriter = LinkRewriter::new(
        Arc::clone(&store) as Arc<dyn ContentStore>,
        Arc::new(PathLinkScanner::new()),
        10,
    );
    let stats = rewriter.fix_links(1, &remap).await.unwrap();
    assert_eq!(stats.batches, 0);
}

#[tokio::test]
async fn test_rewriter_keeps_batches_committed_before_failure() {
    let store = Arc::new(MemoryContentStore::new());
    let root = store.add_template_root(Theme::ERestore);
    let page = store.add_template_page(root, PageType::Content, "Wiederherstellen", &[]);
    let first = store.add_block(page, "b1", Some("/admin/page/42#block-2"));
    let second = store.add_block(page, "b2", Some("/admin/page/42"));
    store.fail_block_updates_after(1);

    let remap = RemapTables::new();
    remap.pages.insert(42, 142);
    remap.blocks.insert(2, first + 1_000);
    remap.blocks.insert(3, first);
    remap.blocks.insert(4, second);

    let rewriter = LinkRewriter::new(
        Arc::clone(&store) as Arc<dyn ContentStore>,
        Arc::new(PathLinkScanner::new()),
        1,
    );
    let err = rewriter.fix_links(9, &remap).await.unwrap_err();

    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(
        store.block(first).unwrap().content.as_deref(),
        Some(format!("/organization/9/page/142#block-{}", first + 1_000).as_str())
    );
    assert_eq!(
        store.block(second).unwrap().content.as_deref(),
        Some("/admin/page/42")
    );
}
