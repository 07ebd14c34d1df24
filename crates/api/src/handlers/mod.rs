pub mod native_doc_files;
